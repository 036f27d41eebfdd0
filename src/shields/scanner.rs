//! One-shot scan of the document when the page finishes loading

use super::report::{Reporter, ResourceType};
use crate::page::{Document, Listener};
use std::rc::Rc;

/// Everything worth reporting once the page has loaded: every external
/// script, and every image that never decoded (zero natural width)
pub(crate) fn scan(
    document: &Document,
    report_unrendered_images: bool,
) -> Vec<(String, ResourceType)> {
    let mut found: Vec<(String, ResourceType)> = document
        .scripts()
        .iter()
        .map(|script| document.resolved_src(script))
        .filter(|src| !src.is_empty())
        .map(|src| (src, ResourceType::Script))
        .collect();

    if report_unrendered_images {
        found.extend(
            document
                .images()
                .iter()
                .filter(|image| image.natural_width() == 0)
                .map(|image| (document.resolved_src(image), ResourceType::Image)),
        );
    }
    found
}

/// Window `load` listener running the scan
pub(crate) fn load_listener(reporter: Reporter, report_unrendered_images: bool) -> Listener {
    Rc::new(move || {
        let Some(document) = reporter.document() else {
            return;
        };
        for (url, resource_type) in scan(&document, report_unrendered_images) {
            reporter.report(&url, resource_type);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn document() -> Rc<Document> {
        let doc = Document::new(Url::parse("https://site.test/").unwrap());

        let external = doc.create_element("script");
        external.set_attribute("src", "https://tracker.test/t.js");
        doc.append_child(doc.head(), external.into());
        doc.append_child(doc.head(), doc.create_element("script").into());

        let broken = doc.create_element("img");
        broken.set_attribute("src", "/missing.png");
        let rendered = doc.create_element("img");
        rendered.set_attribute("src", "/logo.png");
        rendered.set_natural_width(120);
        doc.append_child(doc.body(), broken.into());
        doc.append_child(doc.body(), rendered.into());
        doc
    }

    #[test]
    fn test_scan_reports_scripts_and_unrendered_images() {
        let doc = document();
        assert_eq!(
            scan(&doc, true),
            vec![
                ("https://tracker.test/t.js".to_string(), ResourceType::Script),
                ("https://site.test/missing.png".to_string(), ResourceType::Image),
            ]
        );
    }

    #[test]
    fn test_image_heuristic_can_be_disabled() {
        let doc = document();
        assert_eq!(scan(&doc, false).len(), 1);
    }
}
