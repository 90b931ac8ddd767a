use std::borrow::Cow;

use url::{form_urlencoded, Position, Url};

use super::{AccessToken, StyleRef};

const TOKEN_PARAMETER: &str = "access_token";

/// Describes where styles of a hosting service live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleHost {
    scheme: String,
    symbolic_prefix: String,
    api_base: String,
}

impl Default for StyleHost {
    fn default() -> Self {
        Self::new("mapbox", "styles/", "https://api.mapbox.com/styles/v1/")
    }
}

impl StyleHost {
    /// Creates a new host description.
    ///
    /// A symbolic reference `<scheme>://<symbolic_prefix><namespace>/<path>` is served from
    /// `<api_base><namespace>/<path>`.
    pub fn new(
        scheme: impl Into<String>,
        symbolic_prefix: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        let mut api_base = api_base.into();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }

        Self {
            scheme: scheme.into(),
            symbolic_prefix: symbolic_prefix.into(),
            api_base,
        }
    }
}

/// Raster tiles rendered from a hosted style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileEndpoint {
    source_id: String,
    base: String,
    query: String,
}

impl TileEndpoint {
    /// Id of the tile source, `<namespace>/<path>` of the style.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// URL of a single 256px tile.
    pub fn tile_url(&self, z: u32, x: u32, y: u32) -> String {
        format!("{}/{z}/{x}/{y}?{}", self.base, self.query)
    }
}

/// Maps style references to URLs of the style hosting API.
///
/// All methods are pure. Anything that cannot be resolved yields `None`, which callers treat as
/// "nothing to fetch".
#[derive(Debug, Clone, Default)]
pub struct StyleResolver {
    host: StyleHost,
}

impl StyleResolver {
    /// Creates a resolver for the given host.
    pub fn new(host: StyleHost) -> Self {
        Self { host }
    }

    /// URL of the published JSON definition of the style, with the credential in the query.
    pub fn diagnostic_url(
        &self,
        style: &StyleRef,
        credential: Option<&AccessToken>,
    ) -> Option<Url> {
        let credential = credential?;
        let reference = style.as_str();

        if let Some(path) = self.symbolic_path(reference) {
            let mut url = Url::parse(&self.host.api_base).ok()?.join(path).ok()?;
            url.query_pairs_mut()
                .append_pair(TOKEN_PARAMETER, credential.expose());
            return Some(url);
        }

        let mut url = parse_http(reference)?;
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != TOKEN_PARAMETER)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.set_query(None);
        url.query_pairs_mut()
            .extend_pairs(retained)
            .append_pair(TOKEN_PARAMETER, credential.expose());

        Some(url)
    }

    /// Raster tile endpoint of the style. Only styles served by the configured host have one.
    pub fn tile_endpoint(
        &self,
        style: &StyleRef,
        credential: Option<&AccessToken>,
    ) -> Option<TileEndpoint> {
        let credential = credential?;
        let reference = style.as_str();

        let path = match self.symbolic_path(reference) {
            Some(path) => path.to_string(),
            None => {
                let url = parse_http(reference)?;
                let path = url[..Position::AfterPath]
                    .strip_prefix(self.host.api_base.as_str())?
                    .trim_end_matches('/')
                    .to_string();
                valid_path(&path)?;
                path
            }
        };

        let token: String =
            form_urlencoded::byte_serialize(credential.expose().as_bytes()).collect();
        Some(TileEndpoint {
            base: format!("{}{path}/tiles/256", self.host.api_base),
            source_id: path,
            query: format!("{TOKEN_PARAMETER}={token}"),
        })
    }

    fn symbolic_path<'a>(&self, reference: &'a str) -> Option<&'a str> {
        let path = reference
            .strip_prefix(self.host.scheme.as_str())?
            .strip_prefix("://")?
            .strip_prefix(self.host.symbolic_prefix.as_str())?;
        valid_path(path)
    }
}

fn parse_http(reference: &str) -> Option<Url> {
    let url = Url::parse(reference).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// `<namespace>/<path>` with both parts present.
fn valid_path(path: &str) -> Option<&str> {
    let (namespace, rest) = path.split_once('/')?;
    (!namespace.is_empty() && !rest.is_empty()).then_some(path)
}

/// Replaces the access token in the URL with `***` so that it can be logged.
pub fn redact(url: &str) -> Cow<'_, str> {
    let Ok(mut parsed) = Url::parse(url) else {
        return Cow::Borrowed(url);
    };

    if !parsed.query_pairs().any(|(key, _)| key == TOKEN_PARAMETER) {
        return Cow::Borrowed(url);
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == TOKEN_PARAMETER {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();

    parsed.set_query(None);
    parsed.query_pairs_mut().extend_pairs(pairs);
    Cow::Owned(parsed.into())
}
