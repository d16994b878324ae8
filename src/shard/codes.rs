//! Vendor filter codes and their readable labels

/// Experience levels, intern to executive
pub const EXPERIENCE_CODES: &[&str] = &["1", "2", "3", "4", "5", "6"];

/// Employment types, internship to other
pub const JOB_TYPE_CODES: &[&str] = &["I", "F", "C", "T", "P", "V", "O"];

/// Workplace arrangements: remote, on-site, hybrid
pub const WORKPLACE_CODES: &[&str] = &["2", "1", "3"];

pub fn experience_label(code: &str) -> &str {
    match code {
        "1" => "intern",
        "2" => "entry",
        "3" => "associate",
        "4" => "mid-senior",
        "5" => "director",
        "6" => "executive",
        other => other,
    }
}

pub fn job_type_label(code: &str) -> &str {
    match code {
        "I" => "internship",
        "F" => "full_time",
        "C" => "contract",
        "T" => "temporary",
        "P" => "part_time",
        "V" => "volunteer",
        "O" => "other",
        other => other,
    }
}

pub fn workplace_label(code: &str) -> &str {
    match code {
        "1" => "on_site",
        "2" => "remote",
        "3" => "hybrid",
        other => other,
    }
}
