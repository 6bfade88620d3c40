// Naive string scanning over the marketplace's search and store pages.
// Tag and attribute matching is ASCII case-insensitive.

use crate::types::StoreCandidate;

/// Seller rows of an advanced-search result page (`<tr class="tm">`).
pub fn parse_search_results(html: &str) -> Vec<StoreCandidate> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some((tr_s, tr_e)) = next_tag_block_ci(html, "<tr", "</tr>", pos) {
        let tr = &html[tr_s..tr_e];
        pos = tr_e;

        let open_end = tr.find('>').unwrap_or(tr.len());
        let open_tag = to_lower(&tr[..open_end]);
        if !(open_tag.contains(r#"class="tm""#) || open_tag.contains("class=tm")) {
            continue;
        }

        let cells = cells(tr);
        let (Some(terms), Some(seller)) = (cells.get(2), cells.get(3)) else {
            continue;
        };
        let Some(username) = href_param(seller, "p") else {
            continue;
        };
        let min_buy = parse_min_buy(&strip_tags(terms));
        out.push(StoreCandidate { username, min_buy });
    }
    out
}

/// `Min Buy: None` → None, `Min Buy: ~US $10.00` → Some(10.0).
pub fn parse_min_buy(text: &str) -> Option<f64> {
    let idx = text.find("Min Buy:")?;
    let value = text[idx + "Min Buy:".len()..].trim();
    if value.starts_with("None") {
        return None;
    }
    let amount = &value[value.find('$')? + 1..];
    let digits: String = amount
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .filter(|c| *c != ',')
        .collect();
    digits.parse().ok()
}

/// Extract the seller id from a store page (`id: 12345,` in its inline script).
pub fn parse_store_id(html: &str) -> Option<String> {
    let mut rest = html;
    while let Some(idx) = rest.find("id:") {
        let after = &rest[idx + 3..];
        let trimmed = after.trim_start();
        let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
        let consumed_ws = trimmed.len() != after.len();
        if consumed_ws && !digits.is_empty() && trimmed[digits.len()..].starts_with(',') {
            return Some(digits);
        }
        rest = after;
    }
    None
}

fn cells(tr: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while let Some((td_s, td_e)) = next_tag_block_ci(tr, "<td", "</td>", pos) {
        out.push(&tr[td_s..td_e]);
        pos = td_e;
    }
    out
}

/// Value of query parameter `key` in the first `href` of `block`.
fn href_param(block: &str, key: &str) -> Option<String> {
    let lc = to_lower(block);
    let start = lc.find("href=")? + "href=".len();
    let rest = block[start..].trim_start_matches(['"', '\'']);
    let end = rest.find(['"', '\'', '>', ' ']).unwrap_or(rest.len());
    let href = rest[..end].replace("&amp;", "&");
    let query = href.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

fn next_tag_block_ci(s: &str, open: &str, close: &str, from: usize) -> Option<(usize, usize)> {
    let lc = to_lower(s);
    let start = lc.get(from..)?.find(&to_lower(open))? + from;
    let open_end = s[start..].find('>')? + start + 1;
    let end_rel = lc[open_end..].find(&to_lower(close))?;
    Some((start, open_end + end_rel + close.len()))
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.replace("&nbsp;", " ").chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}
