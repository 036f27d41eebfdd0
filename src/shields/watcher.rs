//! Reports `<script src>` elements as they are inserted

use super::report::{Reporter, ResourceType};
use crate::page::{Document, MutationObserver, MutationRecord, Node};
use std::rc::Rc;

/// Resolved sources of the scripts directly added by `records`
pub(crate) fn inserted_script_sources(
    records: &[MutationRecord],
    document: &Document,
) -> Vec<String> {
    records
        .iter()
        .flat_map(|record| record.added_nodes.iter())
        .filter_map(Node::as_element)
        .filter(|element| element.is("script"))
        .filter(|element| element.get_attribute("src").is_some_and(|src| !src.is_empty()))
        .map(|element| document.resolved_src(element))
        .collect()
}

/// Observer whose callback reports every inserted external script
pub(crate) fn script_watcher(reporter: Reporter) -> MutationObserver {
    MutationObserver::new(Rc::new(move |records: &[MutationRecord]| {
        let Some(document) = reporter.document() else {
            return;
        };
        for src in inserted_script_sources(records, &document) {
            reporter.report(&src, ResourceType::Script);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_only_external_scripts() {
        let document = Document::new(Url::parse("https://site.test/a/").unwrap());
        let external = document.create_element("script");
        external.set_attribute("src", "lib.js");
        let inline = document.create_element("script");
        let empty = document.create_element("script");
        empty.set_attribute("src", "");
        let image = document.create_element("img");
        image.set_attribute("src", "x.png");

        let records = vec![MutationRecord {
            target: Rc::clone(document.body()),
            added_nodes: vec![
                external.into(),
                inline.into(),
                empty.into(),
                image.into(),
                Node::text("hello"),
            ],
        }];

        assert_eq!(
            inserted_script_sources(&records, &document),
            vec!["https://site.test/a/lib.js".to_string()]
        );
    }
}
