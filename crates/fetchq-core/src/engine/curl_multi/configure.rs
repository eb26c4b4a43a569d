//! Apply a `TransferConfig` to an Easy2 handle: target, referer, headers,
//! timeouts, proxy, credentials, body and cookie jar.

use curl::easy::{Auth, Easy2, Form, List};

use crate::engine::TransferConfig;
use crate::error::EngineError;
use crate::request::RequestBody;

use super::handler::Collector;

/// Resets `easy` to defaults (keeping live connections and caches) and
/// applies `config`.
pub(super) fn apply(easy: &mut Easy2<Collector>, config: &TransferConfig) -> Result<(), EngineError> {
    easy.reset();
    easy.get_mut().reset();

    easy.verbose(config.verbose)?;
    easy.url(&config.url)?;
    if let Some(ref referer) = config.referer {
        easy.referer(referer)?;
    }
    easy.useragent(&config.user_agent)?;
    easy.signal(false)?;
    easy.connect_timeout(config.connect_timeout)?;
    easy.low_speed_limit(config.low_speed_limit)?;
    easy.low_speed_time(config.low_speed_time)?;

    if !config.headers.is_empty() {
        let mut list = List::new();
        for h in &config.headers {
            list.append(h)?;
        }
        easy.http_headers(list)?;
    }

    if let Some((ref host, port)) = config.proxy {
        easy.proxy(host)?;
        easy.proxy_port(port)?;
    }

    if let Some(ref credentials) = config.credentials {
        let mut auth = Auth::new();
        auth.basic(true).digest(true).ntlm(true).gssnegotiate(true);
        easy.http_auth(&auth)?;
        let (user, password) = credentials
            .split_once(':')
            .unwrap_or((credentials.as_str(), ""));
        easy.username(user)?;
        easy.password(password)?;
    }

    match config.body {
        Some(RequestBody::UrlEncoded(ref fields)) => {
            easy.post(true)?;
            easy.post_fields_copy(fields.as_bytes())?;
        }
        Some(RequestBody::Multipart(ref fields)) => {
            let mut form = Form::new();
            for field in fields {
                form.part(&field.name)
                    .contents(field.value.as_bytes())
                    .add()?;
            }
            easy.httppost(form)?;
        }
        None => {}
    }

    if let Some(ref jar) = config.cookie_jar {
        easy.cookie_file(jar)?;
        easy.cookie_jar(jar)?;
    }

    Ok(())
}
