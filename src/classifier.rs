use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;

static TARGET_PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www\.)?youtube\.com/(watch|playlist|feed|channel|c)/?")
        .expect("target page pattern is valid")
});

static VIDEO_PAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www\.)?youtube\.com/watch\?v=").expect("video page pattern is valid")
});

/// Decides whether a URL belongs to the monitored site and remembers the
/// last video the user was watching, so a break can send them back to it.
///
/// Clones share the remembered URL.
#[derive(Debug, Clone, Default)]
pub struct PageClassifier {
    last_video_url: Arc<RwLock<Option<String>>>,
}

impl PageClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_target_page(&self, url: Option<&str>) -> bool {
        let Some(url) = url.filter(|url| !url.is_empty()) else {
            return false;
        };

        if VIDEO_PAGE.is_match(url) {
            let mut guard = self
                .last_video_url
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = Some(url.to_string());
        }

        TARGET_PAGE.is_match(url)
    }

    pub fn last_video_url(&self) -> Option<String> {
        self.last_video_url
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn forget_last_video(&self) {
        let mut guard = self
            .last_video_url
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }
}
