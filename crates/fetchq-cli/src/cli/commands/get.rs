//! Get command: start every URL on one scheduler, poll until idle, print
//! each event as it is delivered.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use fetchq_core::collab::Collaborators;
use fetchq_core::config::{FetchSettings, FetchqConfig};
use fetchq_core::{CurlEngine, FetchEvent, FetchId, FetchSpec, FormField, RequestBody, Scheduler};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::cli::GetArgs;

/// One event as printed with `--json`.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct EventRecord<'a> {
    url: &'a str,
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    realm: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
}

impl<'a> EventRecord<'a> {
    fn new(url: &'a str, event: &FetchEvent<'a>) -> Self {
        let mut rec = EventRecord {
            url,
            event: "",
            mime: None,
            content_length: None,
            bytes: None,
            message: None,
            target: None,
            realm: None,
            sha256: None,
        };
        match *event {
            FetchEvent::Type {
                mime,
                content_length,
            } => {
                rec.event = "type";
                rec.mime = Some(mime);
                rec.content_length = Some(content_length);
            }
            FetchEvent::Data(chunk) => {
                rec.event = "data";
                rec.bytes = Some(chunk.len());
            }
            FetchEvent::Finished => rec.event = "finished",
            FetchEvent::Error(msg) => {
                rec.event = "error";
                rec.message = Some(msg);
            }
            FetchEvent::Redirect(target) => {
                rec.event = "redirect";
                rec.target = Some(target);
            }
            FetchEvent::Auth { realm } => {
                rec.event = "auth";
                rec.realm = Some(realm);
            }
        }
        rec
    }
}

/// Parses a `NAME=VALUE` form field argument.
fn parse_field(arg: &str) -> Result<FormField> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok(FormField::new(name, value)),
        _ => bail!("form field must be NAME=VALUE, got '{}'", arg),
    }
}

fn request_body(args: &GetArgs) -> Result<Option<RequestBody>> {
    if let Some(ref data) = args.data {
        return Ok(Some(RequestBody::UrlEncoded(data.clone())));
    }
    if args.fields.is_empty() {
        return Ok(None);
    }
    let fields = args
        .fields
        .iter()
        .map(|f| parse_field(f))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(RequestBody::Multipart(fields)))
}

/// Callback printing the events of one fetch. Counts ERROR events in `errors`.
fn printer(
    url: String,
    json: bool,
    sha256: bool,
    errors: Rc<Cell<usize>>,
) -> impl FnMut(&mut Scheduler, FetchId, FetchEvent<'_>) + 'static {
    let mut hasher = sha256.then(Sha256::new);
    move |_: &mut Scheduler, _: FetchId, event: FetchEvent<'_>| {
        if let (Some(h), FetchEvent::Data(chunk)) = (hasher.as_mut(), &event) {
            h.update(chunk);
        }
        if matches!(event, FetchEvent::Error(_)) {
            errors.set(errors.get() + 1);
        }
        let digest = match event {
            FetchEvent::Finished => hasher.take().map(|h| hex::encode(h.finalize())),
            _ => None,
        };

        if json {
            let mut rec = EventRecord::new(&url, &event);
            rec.sha256 = digest;
            match serde_json::to_string(&rec) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("serialize event for {}: {}", url, e),
            }
        } else {
            println!("{}: {}", url, event);
            if let Some(d) = digest {
                println!("{}: SHA256 {}", url, d);
            }
        }
    }
}

/// Fetch every URL in `args` and print events until all are done.
pub fn run_get(cfg: &FetchqConfig, args: &GetArgs) -> Result<()> {
    let body = request_body(args)?;
    let mut sched = Scheduler::new(
        CurlEngine::new(),
        FetchSettings::from_config(cfg),
        Collaborators::from_config(cfg),
    );
    let errors = Rc::new(Cell::new(0usize));

    for url in &args.urls {
        let mut spec = FetchSpec::new(url.as_str())
            .only_2xx(args.only_2xx)
            .cookies(args.cookies);
        if let Some(ref referer) = args.referer {
            spec = spec.referer(referer.as_str());
        }
        if let Some(ref body) = body {
            spec = spec.body(body.clone());
        }
        let callback = printer(url.clone(), args.json, args.sha256, Rc::clone(&errors));
        if let Err(e) = sched.start(spec, callback) {
            eprintln!("{}: {}", url, e);
            tracing::warn!("start {}: {}", url, e);
            errors.set(errors.get() + 1);
        }
    }

    let interval = Duration::from_millis(cfg.poll_interval_ms.max(1));
    loop {
        sched.poll();
        if !sched.is_active() {
            break;
        }
        sched.wait(interval).context("wait for transfer activity")?;
    }
    sched.shutdown();

    let failed = errors.get();
    if failed > 0 {
        bail!("{} of {} fetches failed", failed, args.urls.len());
    }
    Ok(())
}
