use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

/// Date-valued fields returned by the metadata tool, keyed `Group:Tag`.
pub type MetadataFields = BTreeMap<String, String>;

/// Original-capture tags, highest priority
pub const ORIGINAL_TAGS: &[&str] = &[
    "EXIF:DateTimeOriginal",
    "XMP:DateTimeOriginal",
    "QuickTime:DateTimeOriginal",
];

/// Creation tags (videos mostly carry only these)
pub const CREATION_TAGS: &[&str] = &[
    "QuickTime:CreateDate",
    "QuickTime:CreationDate",
    "EXIF:CreateDate",
    "XMP:CreateDate",
];

/// Modification tags as recorded inside the file, not the filesystem mtime
pub const MODIFICATION_TAGS: &[&str] = &["EXIF:ModifyDate", "QuickTime:ModifyDate", "XMP:ModifyDate"];

/// Pick the first present, parseable and accepted date in tag priority order.
pub fn date_from_fields(
    fields: &MetadataFields,
    accept: impl Fn(&NaiveDateTime) -> bool,
) -> Option<(NaiveDateTime, &'static str)> {
    ORIGINAL_TAGS
        .iter()
        .chain(CREATION_TAGS)
        .chain(MODIFICATION_TAGS)
        .find_map(|tag| {
            let dt = parse_metadata_datetime(fields.get(*tag)?)?;
            accept(&dt).then_some((dt, *tag))
        })
}

/// Parse `YYYY:MM:DD hh:mm:ss[.fff][+zz:zz]` or a bare `YYYY:MM:DD`.
/// Zone offsets are dropped: the wall-clock time is what was on the camera.
pub fn parse_metadata_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s.trim().replace(['-', '/', '\\', '.'], ":");

    if let Some(head) = cleaned.get(..19) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(head, "%Y:%m:%d %H:%M:%S") {
            return Some(dt);
        }
    }

    let date_part = cleaned.split(' ').next()?;
    NaiveDate::parse_from_str(date_part, "%Y:%m:%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
}
