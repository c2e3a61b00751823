// Header component

use reqwest::header::{HeaderName, HeaderValue};

use super::{set_pair_at, Component};
use crate::error::FuzzError;
use crate::models::{FuzzRequest, PartKind};

#[derive(Debug, Clone)]
pub struct HeaderComponent {
    request: FuzzRequest,
    headers: Vec<(String, String)>,
}

impl HeaderComponent {
    pub fn parse(request: &FuzzRequest) -> Self {
        Self {
            request: request.clone(),
            headers: request.headers.clone(),
        }
    }
}

impl Component for HeaderComponent {
    fn kind(&self) -> PartKind {
        PartKind::Header
    }

    fn iterate(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn set_value(&mut self, key: &str, value: &str) -> Result<(), FuzzError> {
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some((_, v)) => {
                *v = value.to_string();
                Ok(())
            }
            None => Err(FuzzError::InvalidKey(key.to_string())),
        }
    }

    fn set_value_at(&mut self, position: usize, key: &str, value: &str) -> Result<(), FuzzError> {
        set_pair_at(&mut self.headers, position, key, value, |a, b| a.eq_ignore_ascii_case(b))
    }

    /// Fails with `Build` when a header would not survive the wire
    /// (e.g. a payload containing CR/LF).
    fn rebuild(&self) -> Result<FuzzRequest, FuzzError> {
        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FuzzError::Build(format!("header name '{}': {}", name, e)))?;
            HeaderValue::from_str(value)
                .map_err(|e| FuzzError::Build(format!("header '{}' value: {}", name, e)))?;
        }

        let mut request = self.request.clone();
        request.headers = self.headers.clone();
        Ok(request)
    }
}
