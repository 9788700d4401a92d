//! The HTTP transport: the two smart-HTTP endpoints a v0 fetch needs.
//! Blocking, single-shot, and unauthenticated by design.

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::error::{Error, Result};

const USER_AGENT: &str = concat!("microgit/", env!("CARGO_PKG_VERSION"));

fn client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Http(e.to_string()))
}

/// `<base_url>.git/info/refs?service=git-upload-pack`, returning the raw
/// pkt-line-framed ref advertisement.
pub fn get_refs(base_url: &str) -> Result<Vec<u8>> {
    let url = format!("{}.git/info/refs?service=git-upload-pack", base_url.trim_end_matches('/'));
    log::debug!("GET {}", url);
    let response = client()?.get(&url).send().map_err(|e| Error::Http(e.to_string()))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::Http(format!("GET {} returned {}", url, status)));
    }

    response.bytes().map(|b| b.to_vec()).map_err(|e| Error::Http(e.to_string()))
}

/// `POST <base_url>.git/git-upload-pack` with the want/done request body,
/// returning the raw (still side-band-multiplexed) response.
pub fn post_upload_pack(base_url: &str, body: Vec<u8>) -> Result<Vec<u8>> {
    let url = format!("{}.git/git-upload-pack", base_url.trim_end_matches('/'));
    log::debug!("POST {} ({} bytes)", url, body.len());
    let response = client()?
        .post(&url)
        .header("Content-Type", "application/x-git-upload-pack-request")
        .body(body)
        .send()
        .map_err(|e| Error::Http(e.to_string()))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::Http(format!("POST {} returned {}", url, status)));
    }

    response.bytes().map(|b| b.to_vec()).map_err(|e| Error::Http(e.to_string()))
}
