const WORD_DOCUMENT: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const SPREADSHEET: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const PRESENTATION: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Legacy document formats and the native format they become when
/// conversion is enabled.
pub const CONVERSIONS: &[(&str, &str)] = &[
    ("application/msword", WORD_DOCUMENT),
    ("application/rtf", WORD_DOCUMENT),
    ("text/rtf", WORD_DOCUMENT),
    ("application/vnd.ms-excel", SPREADSHEET),
    ("application/vnd.ms-powerpoint", PRESENTATION),
];

pub const SPREADSHEET_TYPES: &[&str] = &[
    SPREADSHEET,
    "application/vnd.ms-excel",
    "application/vnd.oasis.opendocument.spreadsheet",
];

/// How a single file is reproduced at the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPolicy {
    Convert { target_mime: &'static str },
    Spreadsheet,
    Duplicate,
}

impl CopyPolicy {
    pub fn for_mime(mime_type: Option<&str>, convert: bool) -> Self {
        let Some(mime_type) = mime_type else {
            return CopyPolicy::Duplicate;
        };
        if convert
            && let Some(&(_, target)) = CONVERSIONS
                .iter()
                .find(|(source, _)| source.eq_ignore_ascii_case(mime_type))
        {
            return CopyPolicy::Convert {
                target_mime: target,
            };
        }
        if SPREADSHEET_TYPES
            .iter()
            .any(|kind| kind.eq_ignore_ascii_case(mime_type))
        {
            return CopyPolicy::Spreadsheet;
        }
        CopyPolicy::Duplicate
    }
}
