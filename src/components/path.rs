// URL path segment component
// Keys are 1-based segment positions: "/api/users/7" → 1=api, 2=users, 3=7.
// Empty segments (trailing slash, "//") are kept on rebuild but never yielded.

use reqwest::Url;

use super::Component;
use crate::error::FuzzError;
use crate::models::{FuzzRequest, PartKind};

#[derive(Debug, Clone)]
pub struct PathComponent {
    request: FuzzRequest,
    url: Url,
    segments: Vec<String>,
}

impl PathComponent {
    pub fn parse(request: &FuzzRequest) -> Result<Self, FuzzError> {
        let url = request.parsed_url()?;
        let segments = url
            .path_segments()
            .ok_or_else(|| FuzzError::InvalidRequest(format!("url has no path: {}", request.url)))?
            .map(|s| s.to_string())
            .collect();

        Ok(Self {
            request: request.clone(),
            url,
            segments,
        })
    }

    fn index(&self, key: &str) -> Result<usize, FuzzError> {
        match key.parse::<usize>() {
            Ok(position) if position >= 1 && position <= self.segments.len() => Ok(position - 1),
            _ => Err(FuzzError::InvalidKey(key.to_string())),
        }
    }
}

impl Component for PathComponent {
    fn kind(&self) -> PartKind {
        PartKind::Path
    }

    fn iterate(&self) -> Vec<(String, String)> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| !segment.is_empty())
            .map(|(i, segment)| ((i + 1).to_string(), segment.clone()))
            .collect()
    }

    fn set_value(&mut self, key: &str, value: &str) -> Result<(), FuzzError> {
        let index = self.index(key)?;
        self.segments[index] = value.to_string();
        Ok(())
    }

    fn rebuild(&self) -> Result<FuzzRequest, FuzzError> {
        let mut url = self.url.clone();
        url.set_path(&format!("/{}", self.segments.join("/")));

        let mut request = self.request.clone();
        request.url = url.to_string();
        Ok(request)
    }
}
