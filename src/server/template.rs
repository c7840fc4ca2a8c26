//! Client script templating
//!
//! `index.js` is rendered per request with `$`-placeholders:
//!
//! - `$$` is an escaped `$`
//! - `$name` and `${name}` are replaced by the value for `name`, where a name
//!   is an ASCII identifier (`[_A-Za-z][_A-Za-z0-9]*`)
//!
//! Unknown names and any other use of `$` are errors, so a template typo
//! shows up as a failed request rather than a silently broken script.

use std::net::IpAddr;

use thiserror::Error;

/// Error rendering a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Placeholder name has no value
    #[error("unknown placeholder '{0}'")]
    UnknownKey(String),

    /// `$` not followed by `$`, an identifier or `{identifier}`
    #[error("invalid placeholder at byte {0}")]
    InvalidPlaceholder(usize),
}

/// Values substituted into the client script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptParams {
    /// Address the browser should connect its websocket to
    pub ip: IpAddr,
    /// Relay port
    pub port: u16,
    /// Target frame rate
    pub fps: u32,
}

impl ScriptParams {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "ip" => Some(self.ip.to_string()),
            "port" => Some(self.port.to_string()),
            "fps" => Some(self.fps.to_string()),
            _ => None,
        }
    }

    /// Render `template` with these values
    pub fn render(&self, template: &str) -> Result<String, TemplateError> {
        substitute(template, |key| self.lookup(key))
    }
}

/// Length of the identifier at the start of `s` (0 if none)
fn identifier_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return 0,
    }
    bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count()
}

/// Replace placeholders in `template` using `lookup`
pub fn substitute<F>(template: &str, lookup: F) -> Result<String, TemplateError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    let value = |name: &str, out: &mut String| -> Result<(), TemplateError> {
        let v = lookup(name).ok_or_else(|| TemplateError::UnknownKey(name.to_string()))?;
        out.push_str(&v);
        Ok(())
    };

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let at = offset + pos;
        let after = &rest[pos + 1..];

        let consumed = if after.starts_with('$') {
            out.push('$');
            pos + 2
        } else if let Some(braced) = after.strip_prefix('{') {
            let end = braced
                .find('}')
                .ok_or(TemplateError::InvalidPlaceholder(at))?;
            let name = &braced[..end];
            if name.is_empty() || identifier_len(name) != name.len() {
                return Err(TemplateError::InvalidPlaceholder(at));
            }
            value(name, &mut out)?;
            pos + 2 + end + 1
        } else {
            let len = identifier_len(after);
            if len == 0 {
                return Err(TemplateError::InvalidPlaceholder(at));
            }
            value(&after[..len], &mut out)?;
            pos + 1 + len
        };

        rest = &rest[consumed..];
        offset += consumed;
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn params() -> ScriptParams {
        ScriptParams {
            ip: "192.168.1.20".parse().unwrap(),
            port: 8000,
            fps: 30,
        }
    }

    #[test]
    fn test_render_all_placeholders() {
        let script = "new WebSocket('ws://$ip:${port}/ws/'); var fps = $fps;";
        let rendered = assert_ok!(params().render(script));

        assert_eq!(
            rendered,
            "new WebSocket('ws://192.168.1.20:8000/ws/'); var fps = 30;"
        );
    }

    #[test]
    fn test_escaped_dollar() {
        let rendered = assert_ok!(params().render("cost: $$5, fps=$fps"));
        assert_eq!(rendered, "cost: $5, fps=30");
    }

    #[test]
    fn test_identifier_stops_at_punctuation() {
        let rendered = assert_ok!(params().render("$ip:$port."));
        assert_eq!(rendered, "192.168.1.20:8000.");
    }

    #[test]
    fn test_unknown_key() {
        let err = assert_err!(params().render("x = $width;"));
        assert_eq!(err, TemplateError::UnknownKey("width".into()));
    }

    #[test]
    fn test_invalid_placeholders() {
        assert_eq!(
            params().render("a $ b"),
            Err(TemplateError::InvalidPlaceholder(2))
        );
        assert_eq!(
            params().render("${ip"),
            Err(TemplateError::InvalidPlaceholder(0))
        );
        assert_eq!(
            params().render("${1x}"),
            Err(TemplateError::InvalidPlaceholder(0))
        );
        assert_eq!(
            params().render("trailing $"),
            Err(TemplateError::InvalidPlaceholder(9))
        );
    }

    #[test]
    fn test_no_placeholders() {
        let rendered = assert_ok!(params().render("plain text, ünïcode"));
        assert_eq!(rendered, "plain text, ünïcode");
    }
}
