//! [`PageFetcher`] backed by `reqwest`.
//!
//! BCRA pages are plain HTML forms: the page lists the available
//! instruments in a `<select>`, and submitting the form with an option
//! value (plus date fields) returns the data table.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::{FetchError, PageFetcher, PageRequest};

/// Fetches BCRA pages over HTTP.
///
/// The underlying [`reqwest::Client`] is created on the first request and
/// reused for the rest of the run.
#[derive(Debug)]
pub struct HttpFormFetcher {
    url: String,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

impl HttpFormFetcher {
    /// Creates a fetcher for the form at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
            client: None,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// URL of the form.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn client(&mut self) -> Result<reqwest::Client, FetchError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(classify)?;
        log::debug!("Opened HTTP session for {}", self.url);
        self.client = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl PageFetcher for HttpFormFetcher {
    async fn fetch(&mut self, request: &PageRequest) -> Result<Option<String>, FetchError> {
        let client = self.client()?;

        let mut form = request.fields.clone();
        if let Some(selector) = &request.selector {
            let page = get_text(client.get(&self.url)).await?;
            let Some(value) = option_value(&page, selector, &request.input_value)? else {
                log::warn!(
                    "'{}' is not among the options of select '{selector}' at {}",
                    request.input_value,
                    self.url
                );
                return Ok(None);
            };
            form.insert(0, (selector.clone(), value));
        }

        get_text(client.post(&self.url).form(&form)).await.map(Some)
    }
}

async fn get_text(builder: reqwest::RequestBuilder) -> Result<String, FetchError> {
    builder
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(classify)?
        .text()
        .await
        .map_err(classify)
}

fn compile(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::InvalidSelector {
        selector: css.to_owned(),
        message: e.to_string(),
    })
}

/// Looks up the value of the option whose text is `label` in
/// `select[name=<name>]`.
fn option_value(page: &str, name: &str, label: &str) -> Result<Option<String>, FetchError> {
    let select_css = format!("select[name=\"{name}\"]");
    let select = compile(&select_css)?;
    let option = compile("option")?;

    let document = Html::parse_document(page);
    let element = document
        .select(&select)
        .next()
        .ok_or_else(|| FetchError::ElementNotFound {
            element: select_css.clone(),
        })?;

    Ok(element.select(&option).find_map(|opt| {
        let text = opt.text().collect::<String>();
        (text.trim() == label).then(|| {
            opt.value()
                .attr("value")
                .map_or_else(|| text.trim().to_owned(), str::to_owned)
        })
    }))
}

/// Splits transport failures into the ones worth retrying and the rest.
fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() || e.is_connect() {
        FetchError::Timeout {
            message: e.to_string(),
        }
    } else {
        FetchError::Http(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = r#"
        <form method="post">
            <select name="moneda">
                <option value="0">Seleccione</option>
                <option value="2">Dolar Estadounidense</option>
                <option value="98">Euro</option>
                <option>Real</option>
            </select>
            <input type="text" name="fecha">
        </form>
    "#;

    #[test]
    fn finds_option_value_by_label() {
        assert_eq!(
            option_value(FORM, "moneda", "Euro").unwrap(),
            Some("98".to_string())
        );
    }

    #[test]
    fn falls_back_to_option_text() {
        assert_eq!(
            option_value(FORM, "moneda", "Real").unwrap(),
            Some("Real".to_string())
        );
    }

    #[test]
    fn unknown_label_is_none() {
        assert_eq!(option_value(FORM, "moneda", "Libra").unwrap(), None);
    }

    #[test]
    fn missing_select_is_element_not_found() {
        assert!(matches!(
            option_value("<form></form>", "moneda", "Euro"),
            Err(FetchError::ElementNotFound { .. })
        ));
    }

    #[test]
    fn unparsable_select_name_is_invalid_selector() {
        assert!(matches!(
            option_value(FORM, "mon\"eda", "Euro"),
            Err(FetchError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn session_is_created_once() {
        let mut fetcher = HttpFormFetcher::new("https://www.bcra.gob.ar/libor")
            .with_timeout(Duration::from_secs(5));
        assert!(fetcher.client.is_none());
        fetcher.client().unwrap();
        assert!(fetcher.client.is_some());
        assert_eq!(fetcher.url(), "https://www.bcra.gob.ar/libor");
    }
}
