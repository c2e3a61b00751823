// Query parameter component

use reqwest::Url;

use super::{set_pair_at, Component};
use crate::error::FuzzError;
use crate::models::{FuzzRequest, PartKind};

#[derive(Debug, Clone)]
pub struct QueryComponent {
    request: FuzzRequest,
    url: Url,
    params: Vec<(String, String)>,
}

impl QueryComponent {
    pub fn parse(request: &FuzzRequest) -> Result<Self, FuzzError> {
        let url = request.parsed_url()?;
        let params = url.query_pairs().into_owned().collect();
        Ok(Self {
            request: request.clone(),
            url,
            params,
        })
    }
}

impl Component for QueryComponent {
    fn kind(&self) -> PartKind {
        PartKind::Query
    }

    fn iterate(&self) -> Vec<(String, String)> {
        self.params.clone()
    }

    fn set_value(&mut self, key: &str, value: &str) -> Result<(), FuzzError> {
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => {
                *v = value.to_string();
                Ok(())
            }
            None => Err(FuzzError::InvalidKey(key.to_string())),
        }
    }

    /// Repeated parameters (`?a=1&a=2`) are addressed by position
    fn set_value_at(&mut self, position: usize, key: &str, value: &str) -> Result<(), FuzzError> {
        set_pair_at(&mut self.params, position, key, value, |a, b| a == b)
    }

    fn rebuild(&self) -> Result<FuzzRequest, FuzzError> {
        let mut url = self.url.clone();
        if self.params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(self.params.iter());
        }

        let mut request = self.request.clone();
        request.url = url.to_string();
        Ok(request)
    }
}

/// Decode an `application/x-www-form-urlencoded` string
pub(crate) fn form_decode(input: &str) -> Result<Vec<(String, String)>, FuzzError> {
    let mut url = Url::parse("http://form.invalid/")
        .map_err(|e| FuzzError::InvalidRequest(e.to_string()))?;
    url.set_query(Some(input));
    Ok(url.query_pairs().into_owned().collect())
}

/// Encode pairs as `application/x-www-form-urlencoded`
pub(crate) fn form_encode(pairs: &[(String, String)]) -> Result<String, FuzzError> {
    let mut url = Url::parse("http://form.invalid/").map_err(|e| FuzzError::Build(e.to_string()))?;
    url.query_pairs_mut().extend_pairs(pairs.iter());
    Ok(url.query().unwrap_or_default().to_string())
}
