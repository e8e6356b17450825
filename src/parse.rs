use lazy_static::lazy_static;
use regex::Regex;

use crate::types::*;

lazy_static! {
    static ref NAMESPACE_RE: Regex = Regex::new(
        r"(?i)NAMESPACE +(\( *\(.+\) *\)|NIL) +(\( *\(.+\) *\)|NIL) +(\( *\(.+\) *\)|NIL)"
    )
    .unwrap();
    static ref NAMESPACE_PAIR_RE: Regex =
        Regex::new(r#"(?i)\(\s*"((?:[^"\\]|\\.)*)"\s+(?:"((?:[^"\\]|\\.)*)"|NIL)"#).unwrap();
    static ref LIST_RE: Regex = Regex::new(
        r#"(?i)^LIST \(.*\) (?:"((?:[^"\\]|\\.)*)"|NIL) (?:"((?:[^"\\]|\\.)*)"|(.*?))\s*$"#
    )
    .unwrap();
}

/// Turn one server line into a [`Response`].
///
/// `current_tag` is the tag of the command in flight. A tagged line carrying any other tag is not
/// trusted: it comes back with an empty [`Status::Unknown`] and the raw tag as its message.
pub(crate) fn parse_line(line: &str, current_tag: Option<&str>) -> Response {
    let line = line.trim();
    let (first, rest) = match line.split_once(' ') {
        Some((first, rest)) => (first, rest),
        None => (line, ""),
    };

    match first {
        "+" => Response::new(ResponseKind::Continuation, Status::Ok, rest.trim()),
        "*" => {
            let (token, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            match Status::keyword(token) {
                Some(status) => Response::new(ResponseKind::Untagged, status, tail.trim()),
                None => Response::new(ResponseKind::Untagged, Status::Ok, rest),
            }
        }
        tag if current_tag == Some(tag) => {
            let (token, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            Response::new(
                ResponseKind::Tagged,
                Status::from_token(token.trim()),
                tail.trim(),
            )
            .with_tag(tag)
        }
        tag => Response::new(ResponseKind::Tagged, Status::Unknown(String::new()), tag)
            .with_tag(tag),
    }
}

/// Fold the untagged lines that preceded `terminal` into a single response unit.
///
/// Works from the line nearest the end backwards. A line followed by a non-`OK` status is dropped
/// in favour of that status. A line followed by untagged `OK` data absorbs that data's text. A
/// line followed by the concluding `OK` tagged or continuation line takes its status and tag.
pub(crate) fn fold(preamble: Vec<Response>, terminal: Response) -> Response {
    preamble
        .into_iter()
        .rev()
        .fold(terminal, |next, mut current| {
            if next.status != Status::Ok {
                return next;
            }
            match next.kind {
                ResponseKind::Untagged => {
                    current.message.push('\n');
                    current.message.push_str(&next.message);
                }
                ResponseKind::Tagged => current.status = next.status,
                ResponseKind::Continuation => {
                    current.status = next.status;
                    current.kind = ResponseKind::Continuation;
                }
            }
            current.tag = next.tag;
            current
        })
}

/// Parse the text of a folded `CAPABILITY` response.
///
/// The first two words of the capability line (the `CAPABILITY` keyword and the protocol
/// revision atom) are skipped.
pub(crate) fn parse_capabilities(message: &str) -> Capabilities {
    let line = message
        .lines()
        .find(|l| {
            l.split_whitespace()
                .next()
                .map(|w| w.eq_ignore_ascii_case("CAPABILITY"))
                .unwrap_or(false)
        })
        .or_else(|| message.lines().next())
        .unwrap_or("");

    let mut caps = Capabilities::default();
    for token in line.split_whitespace().skip(2) {
        caps.insert_token(token);
    }
    caps
}

/// Parse the text of a folded `NAMESPACE` response
/// ([RFC 2342](https://tools.ietf.org/html/rfc2342#section-5)):
///
/// ```text
/// NAMESPACE (("" "/")) (("~" "/")) (("#shared/" "/")("#public/" "/"))
/// ```
pub(crate) fn parse_namespaces(message: &str) -> Vec<Namespace> {
    let caps = match NAMESPACE_RE.captures(message) {
        Some(caps) => caps,
        None => return Vec::new(),
    };

    let kinds = [
        NamespaceKind::Personal,
        NamespaceKind::Other,
        NamespaceKind::Shared,
    ];
    let mut found = Vec::new();
    for (i, kind) in kinds.iter().enumerate() {
        let group = match caps.get(i + 1) {
            Some(g) if !g.as_str().eq_ignore_ascii_case("NIL") => g.as_str(),
            _ => continue,
        };
        for pair in NAMESPACE_PAIR_RE.captures_iter(group) {
            found.push(Namespace {
                name: unquote(pair.get(1).map(|m| m.as_str()).unwrap_or("")),
                delimiter: unquote(pair.get(2).map(|m| m.as_str()).unwrap_or("")),
                kind: *kind,
                hidden: false,
            });
        }
    }
    found
}

/// Find the first `LIST` line in a folded response and return its `(delimiter, name)`.
pub(crate) fn parse_list(message: &str) -> Option<(String, String)> {
    message.lines().find_map(|line| {
        LIST_RE.captures(line.trim_end()).map(|caps| {
            (
                unquote(caps.get(1).map(|m| m.as_str()).unwrap_or("")),
                match caps.get(2) {
                    Some(quoted) => unquote(quoted.as_str()),
                    None => caps.get(3).map(|m| m.as_str()).unwrap_or("").to_string(),
                },
            )
        })
    })
}

/// Extract the hierarchy delimiter from the answer to `LIST "" ""`.
///
/// Servers that send something other than a well-formed `LIST` line get the character after the
/// first double quote.
pub(crate) fn parse_list_delimiter(message: &str) -> String {
    if let Some((delimiter, _)) = parse_list(message) {
        return delimiter;
    }
    message
        .split_once('"')
        .and_then(|(_, after)| after.chars().next())
        .map(String::from)
        .unwrap_or_default()
}

/// Undo quoted-string escaping (`\\` and `\"`).
fn unquote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn untagged(status: Status, msg: &str) -> Response {
        Response::new(ResponseKind::Untagged, status, msg)
    }

    #[test]
    fn parse_continuation() {
        let r = parse_line("+ VXNlcm5hbWU6\r\n", Some("A001"));
        assert_eq!(r.kind(), ResponseKind::Continuation);
        assert_eq!(r.status(), &Status::Ok);
        assert_eq!(r.message(), "VXNlcm5hbWU6");

        let r = parse_line("+\r\n", Some("A001"));
        assert_eq!(r.kind(), ResponseKind::Continuation);
        assert_eq!(r.message(), "");
    }

    #[test]
    fn parse_untagged_status_and_data() {
        let r = parse_line("* OK [UIDVALIDITY 1] ok\r\n", None);
        assert_eq!(r, untagged(Status::Ok, "[UIDVALIDITY 1] ok"));

        let r = parse_line("* BYE Autologout; idle for too long\r\n", None);
        assert_eq!(r, untagged(Status::Bye, "Autologout; idle for too long"));

        // data lines keep their first word
        let r = parse_line("* CAPABILITY IMAP4rev1 IDLE\r\n", None);
        assert_eq!(r, untagged(Status::Ok, "CAPABILITY IMAP4rev1 IDLE"));

        let r = parse_line("* 5 EXISTS\r\n", None);
        assert_eq!(r, untagged(Status::Ok, "5 EXISTS"));
    }

    #[test]
    fn parse_tagged_matching() {
        let r = parse_line("A002 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n", Some("A002"));
        assert_eq!(r.kind(), ResponseKind::Tagged);
        assert_eq!(r.status(), &Status::No);
        assert_eq!(r.tag(), Some("A002"));
        assert_eq!(r.message(), "[AUTHENTICATIONFAILED] Invalid credentials");
    }

    #[test]
    fn parse_tagged_mismatch() {
        let r = parse_line("A007 OK done\r\n", Some("A002"));
        assert_eq!(r.status(), &Status::Unknown(String::new()));
        assert_eq!(r.message(), "A007");

        let r = parse_line("A001 OK done\r\n", None);
        assert_eq!(r.status(), &Status::Unknown(String::new()));
    }

    #[test]
    fn fold_untagged_into_tagged() {
        let lines = ["* 5 EXISTS", "* OK [UIDVALIDITY 1] ok"];
        let preamble = lines.iter().map(|l| parse_line(l, Some("A001"))).collect();
        let terminal = parse_line("A001 OK done", Some("A001"));
        let r = fold(preamble, terminal);
        assert_eq!(r.status(), &Status::Ok);
        assert_eq!(r.kind(), ResponseKind::Untagged);
        assert_eq!(r.tag(), Some("A001"));
        assert_eq!(r.message(), "5 EXISTS\n[UIDVALIDITY 1] ok");
    }

    #[test]
    fn fold_prefers_failing_status() {
        let preamble = vec![untagged(Status::Ok, "LIST () \"/\" foo")];
        let terminal = parse_line("A003 NO no such mailbox", Some("A003"));
        let r = fold(preamble, terminal);
        assert_eq!(r.status(), &Status::No);
        assert_eq!(r.kind(), ResponseKind::Tagged);
        assert_eq!(r.message(), "no such mailbox");
    }

    #[test]
    fn fold_keeps_continuation() {
        let preamble = vec![untagged(Status::Ok, "[ALERT] hello")];
        let terminal = parse_line("+ ready", Some("A001"));
        let r = fold(preamble, terminal);
        assert!(r.is_continuation());
        assert_eq!(r.message(), "[ALERT] hello");
    }

    #[test]
    fn fold_untagged_bye_before_tagged_ok() {
        let preamble = vec![untagged(Status::Bye, "Logging out")];
        let terminal = parse_line("A004 OK LOGOUT completed", Some("A004"));
        let r = fold(preamble, terminal);
        assert_eq!(r.status(), &Status::Ok);
    }

    #[test]
    fn fold_nothing() {
        let terminal = parse_line("A004 OK fine", Some("A004"));
        assert_eq!(fold(Vec::new(), terminal.clone()), terminal);
    }

    #[test]
    fn capabilities_skip_keyword_and_revision() {
        let caps =
            parse_capabilities("CAPABILITY IMAP4rev1 STARTTLS AUTH=GSSAPI AUTH=PLAIN LOGINDISABLED");
        assert!(!caps.has("CAPABILITY"));
        assert!(!caps.has("IMAP4rev1"));
        assert!(caps.has("STARTTLS"));
        assert!(caps.has("LOGINDISABLED"));
        assert!(caps.has_value("AUTH", "GSSAPI"));
        assert!(caps.has_value("AUTH", "PLAIN"));
    }

    #[test]
    fn capabilities_after_preamble() {
        let caps = parse_capabilities("[ALERT] maintenance\nCAPABILITY IMAP4rev1 IDLE");
        assert!(caps.has("IDLE"));
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn namespaces_all_groups() {
        let ns = parse_namespaces(
            r##"NAMESPACE (("" "/")) (("~" "/")) (("#shared/" "/")("#public/" "/"))"##,
        );
        assert_eq!(ns.len(), 4);
        assert_eq!(ns[0].name(), "");
        assert_eq!(ns[0].delimiter(), "/");
        assert_eq!(ns[0].kind(), NamespaceKind::Personal);
        assert_eq!(ns[1].name(), "~");
        assert_eq!(ns[1].kind(), NamespaceKind::Other);
        assert_eq!(ns[2].name(), "#shared/");
        assert_eq!(ns[3].name(), "#public/");
        assert_eq!(ns[3].kind(), NamespaceKind::Shared);
        assert!(ns.iter().all(|n| !n.hidden()));
    }

    #[test]
    fn namespaces_with_nil() {
        let ns = parse_namespaces(r#"NAMESPACE (("INBOX." ".")) NIL NIL"#);
        assert_eq!(ns.len(), 1);
        assert_eq!(ns[0].name(), "INBOX.");
        assert_eq!(ns[0].delimiter(), ".");
    }

    #[test]
    fn namespaces_garbage() {
        assert!(parse_namespaces("NAMESPACE what").is_empty());
    }

    #[test]
    fn list_line() {
        assert_eq!(
            parse_list(r##"LIST (\Noselect) "." "#shared""##),
            Some((".".to_string(), "#shared".to_string()))
        );
        assert_eq!(
            parse_list(r#"LIST () NIL INBOX"#),
            Some((String::new(), "INBOX".to_string()))
        );
        assert_eq!(parse_list("5 EXISTS"), None);
    }

    #[test]
    fn list_line_quoted_name_is_unescaped() {
        assert_eq!(
            parse_list(r#"LIST () "/" "a\\b""#),
            Some(("/".to_string(), r"a\b".to_string()))
        );
        assert_eq!(
            parse_list(r#"LIST () "/" "say \"hi\"""#),
            Some(("/".to_string(), "say \"hi\"".to_string()))
        );
        // atoms are taken as they are
        assert_eq!(
            parse_list(r"LIST () NIL a\b"),
            Some((String::new(), r"a\b".to_string()))
        );
    }

    #[test]
    fn list_delimiter() {
        assert_eq!(parse_list_delimiter(r#"LIST (\Noselect) "." """#), ".");
        assert_eq!(parse_list_delimiter(r#"LIST (\Noselect) "\\" """#), "\\");
        assert_eq!(parse_list_delimiter(r#"odd "/" reply"#), "/");
        assert_eq!(parse_list_delimiter("nothing"), "");
    }
}
