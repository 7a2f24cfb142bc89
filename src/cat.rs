use rand::{Rng, rng, rngs::ThreadRng};
use std::fmt::{self, Display};

/// Status codes that http.cat has an image for, grouped by class.
pub const STATUS_CODES: [u16; 19] = [
    100, 101, //
    200, 201, 202, 204, 206, 207, //
    300, 301, 302, 303, 304, 305, 307, //
    400, 401, 402, 403,
];

static URL_PREFIX: &str = "https://http.cat/";
static URL_SUFFIX: &str = ".jpg";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUrl {
    code: u16,
    url: String,
}

impl ImageUrl {
    pub(crate) fn new(code: u16) -> Self {
        Self {
            code,
            url: format!("{URL_PREFIX}{code}{URL_SUFFIX}"),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Display for ImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl From<ImageUrl> for String {
    fn from(value: ImageUrl) -> Self {
        value.url
    }
}

/// Picks cat images uniformly at random from [`STATUS_CODES`].
///
/// The generator is owned by the selector, so a seeded one can be passed in
/// through [`CatSelector::with_rng`] to make draws reproducible.
pub struct CatSelector<R = ThreadRng> {
    rng: R,
}

impl CatSelector {
    pub fn new() -> Self {
        Self { rng: rng() }
    }
}

impl Default for CatSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> CatSelector<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn select_url(&mut self) -> ImageUrl {
        let code = STATUS_CODES[self.rng.random_range(0..STATUS_CODES.len())];
        ImageUrl::new(code)
    }
}

/// Selects a cat image using the thread-local generator.
pub fn select_url() -> ImageUrl {
    CatSelector::new().select_url()
}
