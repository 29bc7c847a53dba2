pub mod url;

pub use url::{
    Click, CreateShortUrlRequest, CreateShortUrlResponse, ShortUrl, UpdateShortUrlRequest,
    UrlStatsResponse,
};
