//! The fixed instruction prompt sent to the completion service.
//!
//! The reply shape requested here is what [`super::parser`] understands; keep
//! the two in step when editing either.

/// Build the sponsor identification prompt for one newsletter issue.
///
/// `links` is the newline-joined list of hrefs from the issue body and `text`
/// is the issue's plain text.
pub fn sponsor_prompt(
    newsletter_name: &str,
    newsletter_domain: &str,
    links: &str,
    text: &str,
) -> String {
    let slug = newsletter_slug(newsletter_name);
    // "Milk Road" -> "MilkRoad", as written in social handles
    let handle: String = newsletter_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    format!(
        r#"Given the following text and the a tag links from an issue of the {newsletter_name} newsletter, identify the sponsor or sponsors of the issue and their respective websites, and output them in this format:
[{{
    companyName: 'Sample Company',
    website: 'https://www.cryptoslam.io/?utm_source={slug}&utm_medium={slug}&utm_campaign={slug}',
    rootDomain: 'https://www.cryptoslam.io'
}}]

A sponsor can be identified by a link whose href contains utm_source, utm_medium or utm_campaign (for example utm_source={slug}).
The website field must hold the full href, including any utm_source, utm_medium or utm_campaign parameters.
If there are no sponsors, return an empty array: []

Exclude entries like these:
{{
    companyName: '{newsletter_name} Daily',
    website: 'https://twitter.com/{handle}Daily/status/1602321208003162112',
    rootDomain: 'https://twitter.com'
}},
{{
    companyName: '{newsletter_name}',
    website: 'https://{newsletter_domain}/?utm_source={slug}&utm_medium={slug}&utm_campaign={slug}',
    rootDomain: 'https://{newsletter_domain}'
}}

Exclude any company named {newsletter_name} and any link whose domain is {newsletter_domain}.
Exclude links that have twitter.com in them.

Links:
{links}

Text:
{text}
"#
    )
}

/// Lowercased name with everything but ASCII alphanumerics removed,
/// e.g. "Milk Road" -> "milkroad".
pub fn newsletter_slug(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
