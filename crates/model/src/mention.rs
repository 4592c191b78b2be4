//! Replaces platform mention markup in option labels with display text.

use alloc::{format, string::String};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mention {
    User(u64),
    Role(u64),
    Channel(u64),
}

/// Parses one mention at the start of `text`, returning it with the number of bytes it spans.
fn parse(text: &str) -> Option<(Mention, usize)> {
    let body = text.strip_prefix('<')?;
    let end = body.find('>')?;
    let inner = &body[..end];

    let mention = if let Some(id) = inner.strip_prefix("@&") {
        Mention::Role(id.parse().ok()?)
    } else if let Some(id) = inner.strip_prefix("@!").or_else(|| inner.strip_prefix('@')) {
        Mention::User(id.parse().ok()?)
    } else if let Some(id) = inner.strip_prefix('#') {
        Mention::Channel(id.parse().ok()?)
    } else {
        return None;
    };

    // Opening and closing brackets included.
    Some((mention, end + 2))
}

/// Every mention in `text`, in order of appearance.
pub fn scan(text: &str) -> impl Iterator<Item = Mention> + '_ {
    text.match_indices('<').filter_map(|(start, _)| parse(&text[start..]).map(|(mention, _)| mention))
}

/// Rewrites `text`, replacing each mention with the name returned by `lookup`.
///
/// Unresolvable mentions fall back to a generic placeholder so that raw IDs never reach the image.
pub fn resolve<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(Mention) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let Some((mention, len)) = parse(candidate) else {
            out.push('<');
            rest = &candidate[1..];
            continue;
        };

        let name = lookup(mention);
        match (mention, name) {
            (Mention::User(_), Some(name)) | (Mention::Role(_), Some(name)) => out.push_str(&format!("@{name}")),
            (Mention::Channel(_), Some(name)) => out.push_str(&format!("#{name}")),
            (Mention::User(_), None) => out.push_str("@unknown-user"),
            (Mention::Role(_), None) => out.push_str("@deleted-role"),
            (Mention::Channel(_), None) => out.push_str("#deleted-channel"),
        }
        rest = &candidate[len..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    fn names(mention: Mention) -> Option<String> {
        match mention {
            Mention::User(1) => Some("alice".to_string()),
            Mention::Role(2) => Some("Mods".to_string()),
            Mention::Channel(3) => Some("general".to_string()),
            _ => None,
        }
    }

    #[test]
    fn resolves_each_kind() {
        assert_eq!(resolve("<@1> vs <@!1>", names), "@alice vs @alice");
        assert_eq!(resolve("ask <@&2> in <#3>", names), "ask @Mods in #general");
    }

    #[test]
    fn falls_back_for_unknown_ids() {
        assert_eq!(resolve("<@9> <@&9> <#9>", names), "@unknown-user @deleted-role #deleted-channel");
    }

    #[test]
    fn leaves_other_markup_alone() {
        assert_eq!(resolve("a < b <:emoji:5> <@x>", names), "a < b <:emoji:5> <@x>");
        assert_eq!(resolve("trailing <", names), "trailing <");
    }

    #[test]
    fn scans_in_order() {
        let found: Vec<_> = scan("<#3> and <@1>, <@&2>").collect();
        assert_eq!(found, [Mention::Channel(3), Mention::User(1), Mention::Role(2)]);
    }
}
