//! Placeholder substitution for URL templates
//!
//! A placeholder is a bare upper-case identifier (`SLOT_ID`), optionally
//! followed by a parenthesised argument (`CONSENT_METADATA(gdprApplies)`).
//! Only identifiers present in both the allowlist and the macro table are
//! replaced; resolved values are percent-encoded.

use contracts::{
    ExpandError, MacroAllowlist, MacroResult, MacroTable, MacroValue, VariableResolver,
};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResolver;

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder {
        name: &'a str,
        arg: Option<&'a str>,
        raw: &'a str,
    },
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_macro_name(name: &str) -> bool {
    name.bytes().any(|b| b.is_ascii_uppercase())
        && name
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
}

fn tokenize(template: &str) -> Vec<Segment<'_>> {
    let bytes = template.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if !is_ident_byte(bytes[i]) {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && is_ident_byte(bytes[i]) {
            i += 1;
        }
        let name = &template[start..i];
        if !is_macro_name(name) {
            continue;
        }

        let mut end = i;
        let mut arg = None;
        if bytes.get(i) == Some(&b'(') {
            if let Some(close) = template[i + 1..].find(')') {
                let inner = template[i + 1..i + 1 + close].trim();
                arg = (!inner.is_empty()).then_some(inner);
                end = i + close + 2;
            }
        }

        if literal_start < start {
            segments.push(Segment::Literal(&template[literal_start..start]));
        }
        segments.push(Segment::Placeholder {
            name,
            arg,
            raw: &template[start..end],
        });
        i = end;
        literal_start = end;
    }

    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }
    segments
}

fn lookup<'m>(
    name: &str,
    macros: &'m MacroTable,
    allowlist: &MacroAllowlist,
) -> Option<&'m MacroValue> {
    if allowlist.contains(name) {
        macros.get(name)
    } else {
        None
    }
}

/// Resolver failures substitute an empty value.
fn encode(name: &str, result: MacroResult) -> String {
    match result {
        Ok(Some(value)) => urlencoding::encode(&value).into_owned(),
        Ok(None) => String::new(),
        Err(e) => {
            warn!(macro_name = name, error = %e, "Macro resolution failed, substituting empty value");
            String::new()
        }
    }
}

impl VariableResolver for TemplateResolver {
    async fn expand_async(
        &self,
        template: &str,
        macros: &MacroTable,
        allowlist: &MacroAllowlist,
    ) -> Result<String, ExpandError> {
        let mut out = String::with_capacity(template.len());
        for segment in tokenize(template) {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { name, arg, raw } => match lookup(name, macros, allowlist) {
                    Some(value) => out.push_str(&encode(name, value.resolve(arg).await)),
                    None => out.push_str(raw),
                },
            }
        }
        Ok(out)
    }

    fn expand_sync(
        &self,
        template: &str,
        macros: &MacroTable,
        allowlist: &MacroAllowlist,
    ) -> String {
        let mut out = String::with_capacity(template.len());
        for segment in tokenize(template) {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { name, arg, raw } => match lookup(name, macros, allowlist) {
                    Some(value) => out.push_str(&encode(name, value.resolve_now(arg))),
                    None => out.push_str(raw),
                },
            }
        }
        out
    }
}
