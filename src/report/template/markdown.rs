use std::collections::BTreeMap;

use url::form_urlencoded;

use super::substitution::{plain, replace_longest, substitute};

/// URL under which the raw-file route serves `<report id>/images/<image>`.
pub fn image_url(public_base_url: &str, report_id: &str, image: &str) -> String {
    let stored = format!("{}/images/{}", report_id, image);
    let encoded: String = form_urlencoded::byte_serialize(stored.as_bytes()).collect();
    format!("{}/file?name={}", public_base_url, encoded)
}

/// Substitute placeholder values, then point each image reference at its stored copy.
///
/// Both steps are single passes, so text written by one replacement is never
/// matched again.
pub fn render(
    template: &str,
    values: &BTreeMap<String, String>,
    images: &[String],
    report_id: &str,
    public_base_url: &str,
) -> Result<String, regex::Error> {
    let content = substitute(template, values, plain)?;
    let names: Vec<&str> = images.iter().map(String::as_str).collect();
    replace_longest(&content, &names, |image| {
        image_url(public_base_url, report_id, image)
    })
}
