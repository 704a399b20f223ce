use std::borrow::Cow;

use linkify::{LinkFinder, LinkKind};
use serde_json::Value;
use url::Url;

use crate::content::string_field;

/// Wraps every URL in the given plain text in an HTML anchor.
///
/// Returns the text unchanged (and unallocated) if it contains no links.
pub fn linkify(text: &str) -> Cow<'_, str> {
    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url]);
    let mut links = finder.links(text).peekable();
    if links.peek().is_none() {
        return Cow::Borrowed(text);
    }

    let mut linkified = String::with_capacity(text.len() * 2);
    let mut last_end = 0;
    for link in links {
        linkified.push_str(&text[last_end..link.start()]);
        let url = htmlize::escape_attribute(link.as_str());
        linkified.push_str(&format!("<a href=\"{url}\">{}</a>", link.as_str()));
        last_end = link.end();
    }
    linkified.push_str(&text[last_end..]);
    Cow::Owned(linkified)
}

/// Returns the HTTP download URL of the media referenced by an event's `url` content field.
///
/// The `url` must be an `mxc://<server-name>/<media-id>` URI; anything else yields `None`.
pub fn media_download_url(content: &Value, homeserver: &Url) -> Option<Url> {
    let mxc_uri = string_field(content, "url").present()?;
    let (server_name, media_id) = mxc_uri.strip_prefix("mxc://")?.split_once('/')?;
    if server_name.is_empty() || media_id.is_empty() || media_id.contains('/') {
        return None;
    }
    let mut url = homeserver.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["_matrix", "media", "v3", "download", server_name, media_id]);
    Some(url)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn linkify_wraps_urls() {
        assert_eq!(
            linkify("see https://example.org/path now"),
            "see <a href=\"https://example.org/path\">https://example.org/path</a> now",
        );
    }

    #[test]
    fn linkify_borrows_when_no_links() {
        assert!(matches!(linkify("nothing to see here"), Cow::Borrowed(_)));
    }

    #[test]
    fn media_url_from_mxc() {
        let homeserver = Url::parse("https://matrix.example.org").unwrap();
        let content = json!({ "url": "mxc://example.org/WdMXbkBqUiQhljuQUAALYYeh" });
        assert_eq!(
            media_download_url(&content, &homeserver).unwrap().as_str(),
            "https://matrix.example.org/_matrix/media/v3/download/example.org/WdMXbkBqUiQhljuQUAALYYeh",
        );
    }

    #[test]
    fn media_url_rejects_bad_uris() {
        let homeserver = Url::parse("https://matrix.example.org/").unwrap();
        for content in [
            json!({}),
            json!({ "url": "" }),
            json!({ "url": 5 }),
            json!({ "url": "https://example.org/x" }),
            json!({ "url": "mxc://example.org" }),
            json!({ "url": "mxc:///media" }),
        ] {
            assert_eq!(media_download_url(&content, &homeserver), None, "{content}");
        }
    }
}
