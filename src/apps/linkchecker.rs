use crate::apps::restrict_to_host;
use crate::crawler::{Application, ExceptionEvent, LinkOptions, QueueHandle, ResponseEvent, Spider};
use crate::Result;
use std::collections::BTreeMap;
use url::Url;

/// A link to a missing page, as seen from one referring page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    pub url: Url,

    /// Texts of the links on the referring page
    pub link_texts: Vec<String>,
}

/// Finds links answered with 404
///
/// Every URL passing the fetch filter is checked, but only documents on the
/// start host are scanned for further links.
#[derive(Debug, Default)]
pub struct LinkChecker {
    broken: Vec<Url>,
    report: BTreeMap<String, Vec<BrokenLink>>,
}

impl LinkChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs answered with 404, in the order they failed
    pub fn broken_links(&self) -> &[Url] {
        &self.broken
    }

    /// Referring page -> broken links on it, available after the crawl
    pub fn report(&self) -> &BTreeMap<String, Vec<BrokenLink>> {
        &self.report
    }
}

impl Application for LinkChecker {
    fn prepare(&mut self, start: &Url, spider: &mut Spider, _queue: &mut QueueHandle<'_>) -> Result<()> {
        restrict_to_host(spider.link_filter_mut(), start);
        Ok(())
    }

    fn handle_response(&mut self, event: &ResponseEvent, spider: &mut Spider, queue: &mut QueueHandle<'_>) {
        let content_type = event.content_type();
        spider.discover_links(
            queue,
            &event.request_url,
            content_type.as_deref(),
            event.body(),
            &LinkOptions::default(),
        );
    }

    fn handle_exception(&mut self, event: &ExceptionEvent, spider: &Spider) {
        spider.log_exception(event);
        if event.status() == Some(404) {
            self.broken.push(event.request_url.clone());
        }
    }

    fn finish(&mut self, spider: &Spider) -> Result<()> {
        let mut report: BTreeMap<String, Vec<BrokenLink>> = BTreeMap::new();
        for url in &self.broken {
            let referers = spider.referers().get(url.as_str());
            if referers.is_empty() {
                tracing::warn!("Broken URL {} has no referring page", url);
            }
            for referer in referers {
                report
                    .entry(referer.page.to_string())
                    .or_default()
                    .push(BrokenLink {
                        url: url.clone(),
                        link_texts: referer.link_texts.clone(),
                    });
            }
        }

        tracing::info!(
            "{} broken links on {} pages",
            self.broken.len(),
            report.len()
        );
        self.report = report;
        Ok(())
    }
}
