//! Signature sources compiled by [`crate::SanitizationPolicy::new`].
//!
//! All signatures are matched case-insensitively. The `regex` crate has no
//! lookaround, so word boundaries (`\b`) stand in wherever a keyword must not
//! match inside a longer identifier.

/// SQL keywords, comment markers, concatenation, statement separators, hex
/// literals, spaced-out keyword evasions, time-based probes and the
/// `OR/AND ... =` boolean idiom.
pub(crate) const SQL_INJECTION: &[&str] = &[
    r"\b(?:SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|TRUNCATE|EXEC(?:UTE)?|UNION|DECLARE|CAST|CONVERT)\b",
    r"--|#|/\*|\*/",
    r"\|\||\bCONCAT\b",
    r";",
    r"\b0x[0-9a-f]+\b",
    r"\bU\s*N\s*I\s*O\s*N\b|\bS\s*E\s*L\s*E\s*C\s*T\b",
    r"\b(?:SLEEP|BENCHMARK)\s*\(|\bWAITFOR\s+DELAY\b",
    r"\s+(?:OR|AND)\s+.{0,5}=",
];

pub(crate) const PATH_TRAVERSAL: &[&str] = &[
    r"\.\.[\\/]",
    r"\.\.%2f|\.\.%5c",
    r"%2e%2e(?:%2f|%5c|[\\/])",
];

const EVENT_HANDLERS: &str = "error|load|unload|click|dblclick|mousedown|mouseup|mousemove|\
mouseover|mouseout|mouseenter|mouseleave|focus|focusin|focusout|blur|change|submit|reset|select|\
abort|keydown|keypress|keyup|resize|scroll|contextmenu|drag|dragend|dragenter|dragleave|dragover|\
dragstart|drop|animationend|animationiteration|animationstart|transitionend|transitioncancel|\
transitionrun|transitionstart|canplay|canplaythrough|durationchange|emptied|encrypted|ended|\
loadeddata|loadedmetadata|loadstart|pause|play|playing|progress|ratechange|seeked|seeking|stalled|\
suspend|timeupdate|volumechange|waiting|toggle|wheel|copy|cut|paste|afterprint|beforeprint|\
beforeunload|hashchange|message|offline|online|pagehide|pageshow|popstate|storage|show|\
touchcancel|touchend|touchmove|touchstart|pointercancel|pointerdown|pointerenter|pointerleave|\
pointermove|pointerout|pointerover|pointerup|start|finish|bounce|input|invalid|search|\
beforeinput|auxclick";

const DANGEROUS_TAGS: &str = "svg|xml|iframe|frame|frameset|embed|object|applet|meta|link|\
style|base|form|input|button|textarea|img|video|audio|source|track|math|template";

/// Markup signatures with the event-handler and tag alternations interpolated.
pub(crate) fn markup() -> Vec<String> {
    vec![
        r"<\s*script(?:\s|>|/|$)".to_string(),
        r"<\s*/\s*script\s*>".to_string(),
        r"javascript\s*:|vbscript\s*:|data\s*:\s*text\s*/\s*html".to_string(),
        format!(r"\bon(?:{EVENT_HANDLERS})\s*="),
        r"\b(?:eval|setTimeout|setInterval|Function|execScript|expression)\s*\(".to_string(),
        r"&#x?[0-9a-f]+;".to_string(),
        format!(r"<\s*(?:{DANGEROUS_TAGS})(?:\s|>|/|$)"),
        r"<!\s*(?:DOCTYPE|ENTITY)|<\?xml".to_string(),
        r"@import|behavior\s*:|-moz-binding\s*:".to_string(),
    ]
}

pub(crate) const SHELL_METACHARACTERS: &str = r"[;&|`$()<>]";

/// Strict-mode whitelist: ASCII letters, digits, whitespace and `- _ . , @`.
pub(crate) const STRICT_WHITELIST: &str = r"^[A-Za-z0-9\s\-_.,@]*$";

/// Operator-like fragments in datastore keys.
pub(crate) const NOSQL_INJECTION: &str = r"(?s)^\s*\$|\$\w+|\{.*\}|\[.*\]";

pub(crate) const EMAIL: &str = r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}$";

pub(crate) const FILTER_OPERATORS: &[&str] = &[">=", "<=", "!=", ">", "<", "="];

/// `field OP value ((AND|OR) field OP value)*`.
pub(crate) fn filter_expression() -> String {
    let operators = FILTER_OPERATORS
        .iter()
        .map(|op| regex::escape(op))
        .collect::<Vec<_>>()
        .join("|");
    let clause = format!(r"[A-Za-z_][A-Za-z0-9_]*\s*(?:{operators})\s*[A-Za-z0-9\-:.]+");
    format!(r"(?i)^{clause}(?:\s+(?:AND|OR)\s+{clause})*$")
}

/// Schemes `validate_url` refuses outright.
pub(crate) const DANGEROUS_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:", "file:"];

pub const DEFAULT_URL_SCHEMES: &[&str] = &["http", "https"];
