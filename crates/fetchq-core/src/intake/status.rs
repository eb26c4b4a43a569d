//! Status resolution: decide, once per fetch, between redirect, auth
//! challenge, only-2xx rejection and accepting the body.

use crate::collab::{FiletypeLookup, MessageCatalog, MSG_NOT_2XX};
use crate::request::ResponseMeta;
use crate::url_model::{is_http_family, local_path, unescape};

/// MIME type assumed when neither the response nor the filesystem says.
pub(crate) const DEFAULT_MIME: &str = "text/html";

/// Everything status resolution reads.
pub(crate) struct StatusInput<'a> {
    /// Response status; 0 for schemes without one.
    pub status: u32,
    pub url: &'a url::Url,
    pub meta: &'a ResponseMeta,
    pub only_2xx: bool,
    pub http_auth: bool,
    /// Content-Type reported by the engine.
    pub content_type: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// 3xx with a Location; carries the decoded target.
    Redirect(String),
    /// 401 with auth enabled; carries the realm (possibly empty).
    Auth(String),
    /// only-2xx violated; carries the catalog text.
    PolicyError(String),
    Accept { mime: String, content_length: u64 },
}

impl Resolution {
    pub fn rejects(&self) -> bool {
        !matches!(self, Resolution::Accept { .. })
    }
}

pub(crate) fn resolve(
    input: &StatusInput<'_>,
    filetypes: &dyn FiletypeLookup,
    messages: &dyn MessageCatalog,
) -> Resolution {
    let status = input.status;

    if (300..400).contains(&status) {
        if let Some(location) = input.meta.location.as_deref() {
            return Resolution::Redirect(unescape(location));
        }
    }

    if input.http_auth && status == 401 {
        return Resolution::Auth(input.meta.realm.clone().unwrap_or_default());
    }

    if input.only_2xx && is_http_family(input.url) && !(200..=299).contains(&status) {
        return Resolution::PolicyError(messages.get(MSG_NOT_2XX));
    }

    let mime = match input.content_type {
        Some(ct) => ct.to_string(),
        None => match local_path(input.url) {
            Some(path) => filetypes.mime_for_path(&path),
            None => DEFAULT_MIME.to_string(),
        },
    };
    Resolution::Accept {
        mime,
        content_length: input.meta.content_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{DefaultMessages, ExtensionFiletypes};

    struct Case {
        status: u32,
        url: &'static str,
        meta: ResponseMeta,
        only_2xx: bool,
        http_auth: bool,
        content_type: Option<&'static str>,
    }

    impl Case {
        fn new(status: u32, url: &'static str) -> Self {
            Self {
                status,
                url,
                meta: ResponseMeta::default(),
                only_2xx: false,
                http_auth: true,
                content_type: None,
            }
        }

        fn run(&self) -> Resolution {
            let url = url::Url::parse(self.url).unwrap();
            let input = StatusInput {
                status: self.status,
                url: &url,
                meta: &self.meta,
                only_2xx: self.only_2xx,
                http_auth: self.http_auth,
                content_type: self.content_type,
            };
            resolve(&input, &ExtensionFiletypes, &DefaultMessages::default())
        }
    }

    #[test]
    fn redirect_with_location_is_decoded() {
        let mut case = Case::new(302, "http://a/");
        case.meta.location = Some("http://b/new%20page".to_string());
        assert_eq!(case.run(), Resolution::Redirect("http://b/new page".to_string()));
    }

    #[test]
    fn redirect_status_without_location_is_accepted() {
        let mut case = Case::new(304, "http://a/");
        case.content_type = Some("text/css");
        assert!(matches!(case.run(), Resolution::Accept { ref mime, .. } if mime == "text/css"));
    }

    #[test]
    fn redirect_takes_precedence_over_only_2xx() {
        let mut case = Case::new(301, "http://a/");
        case.only_2xx = true;
        case.meta.location = Some("http://b/".to_string());
        assert_eq!(case.run(), Resolution::Redirect("http://b/".to_string()));
    }

    #[test]
    fn auth_challenge_carries_realm_or_empty() {
        let mut case = Case::new(401, "http://a/");
        case.meta.realm = Some("Secret".to_string());
        assert_eq!(case.run(), Resolution::Auth("Secret".to_string()));
        case.meta.realm = None;
        assert_eq!(case.run(), Resolution::Auth(String::new()));
    }

    #[test]
    fn auth_disabled_falls_through_to_policy() {
        let mut case = Case::new(401, "http://a/");
        case.http_auth = false;
        case.only_2xx = true;
        assert_eq!(
            case.run(),
            Resolution::PolicyError("Server returned an error".to_string())
        );
    }

    #[test]
    fn only_2xx_applies_to_http_schemes_only() {
        let mut case = Case::new(404, "https://a/missing");
        case.only_2xx = true;
        assert!(case.run().rejects());

        let mut case = Case::new(0, "ftp://a/file.txt");
        case.only_2xx = true;
        assert!(!case.run().rejects());
    }

    #[test]
    fn non_2xx_without_policy_is_accepted_as_content() {
        let mut case = Case::new(404, "http://a/missing");
        case.meta.content_length = 9;
        assert_eq!(
            case.run(),
            Resolution::Accept {
                mime: DEFAULT_MIME.to_string(),
                content_length: 9
            }
        );
    }

    #[test]
    fn local_file_mime_comes_from_filetype_lookup() {
        let case = Case::new(0, "file:///srv/www/style%20sheet.css");
        assert!(matches!(case.run(), Resolution::Accept { ref mime, .. } if mime == "text/css"));
    }

    #[test]
    fn engine_content_type_wins_over_filetype() {
        let mut case = Case::new(0, "file:///srv/www/page.css");
        case.content_type = Some("text/plain");
        assert!(matches!(case.run(), Resolution::Accept { ref mime, .. } if mime == "text/plain"));
    }
}
