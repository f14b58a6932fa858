/// Formats a query for logs and error messages, cutting it after about 500 bytes.
#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {{
        let (head, cut) = $crate::truncated(&$query, 497);
        format!("{}{}", head.trim_end(), if cut { "..." } else { "" })
    }};
}

#[doc(hidden)]
pub fn truncated(value: &str, max: usize) -> (&str, bool) {
    if value.len() <= max {
        return (value, false);
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    (&value[..end], true)
}

/// Attaches `secondary` to `primary` as context, so `primary` remains the error callers downcast.
pub(crate) fn attach(primary: crate::Error, secondary: crate::Error) -> crate::Error {
    primary.context(format!("Additionally: {:#}", secondary))
}
