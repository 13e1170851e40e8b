use regex::Regex;
use std::sync::OnceLock;

static PORT_REFERENCE: OnceLock<Regex> = OnceLock::new();

fn port_reference() -> &'static Regex {
    PORT_REFERENCE.get_or_init(|| {
        Regex::new(r"COM[0-9]+|/dev/[A-Za-z0-9_./-]+").expect("static port regex is valid")
    })
}

/// Pull the port name out of a device caption such as `USB-SERIAL CH340 (COM13)`.
///
/// The first `COM<digits>` (or `/dev/...` path) whose full digit run is not directly
/// followed by `(` wins, so `Foo (COM3)(COM31)` yields `COM3` and a qualifier like
/// `COM4(x)` is skipped.
pub fn extract_port_name(display_name: &str) -> Option<String> {
    port_reference()
        .find_iter(display_name)
        .find(|found| {
            !display_name
                .get(found.end()..)
                .is_some_and(|rest| rest.starts_with('('))
        })
        .map(|found| found.as_str().to_string())
}
