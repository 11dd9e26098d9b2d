use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

lazy_static! {
    static ref BASE: Selector = Selector::parse("base[href]").unwrap();
    static ref LINK: Selector = Selector::parse("a").unwrap();
    static ref IMG: Selector = Selector::parse("img").unwrap();
}

/// One table row with a recognizable name link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub name: String,
    #[serde(alias = "url")]
    pub detail_url: Option<String>,
    pub image_url: Option<String>,
    pub image_alt: Option<String>,
    pub row_index: usize,
}

/// A document as loaded by a session
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub url: Url,
    pub html: String,
}

pub fn extract(page: &LoadedPage, table: &Selector) -> Vec<Record> {
    let html = Html::parse_document(&page.html);
    extract_html(&html, Some(&page.url), table)
}

/// Extracts records from the body rows of the first table matching `table`
pub fn extract_html(html: &Html, base: Option<&Url>, table: &Selector) -> Vec<Record> {
    let base = document_base(html, base);

    let Some(table) = html.select(table).next() else {
        log::warn!("No table found in document");
        return vec![];
    };

    body_rows(table)
        .enumerate()
        .filter_map(|(row_index, row)| {
            let record = extract_row(row, row_index, base.as_ref());
            if record.is_none() {
                log::debug!("Skipping row {row_index}: no name link");
            }
            record
        })
        .collect()
}

/// Whether the first table matching `table` is present
pub fn has_table(html: &Html, table: &Selector) -> bool {
    html.select(table).next().is_some()
}

fn document_base(html: &Html, page_url: Option<&Url>) -> Option<Url> {
    let href = html
        .select(&BASE)
        .next()
        .and_then(|base| base.value().attr("href"));

    match (href, page_url) {
        (Some(href), Some(url)) => url.join(href).ok().or_else(|| Some(url.clone())),
        (Some(href), None) => Url::parse(href).ok(),
        (None, url) => url.cloned(),
    }
}

fn children<'a>(el: ElementRef<'a>, name: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| child.value().name() == name)
}

fn body_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    children(table, "tbody").flat_map(|tbody| children(tbody, "tr"))
}

fn extract_row(row: ElementRef, row_index: usize, base: Option<&Url>) -> Option<Record> {
    let name_cell = children(row, "td").next()?;
    let link = name_cell.select(&LINK).next()?;

    let name = link.text().collect::<String>().trim().to_string();
    if name.is_empty() {
        return None;
    }

    let detail_url = link
        .value()
        .attr("href")
        .and_then(|href| resolve(href, base));

    let image = first_image(name_cell, base).or_else(|| first_image(row, base));
    let (image_url, image_alt) = match image {
        Some((src, alt)) => {
            let alt = alt.filter(|alt| !alt.is_empty()).unwrap_or(name.as_str());
            (Some(src), Some(alt.to_string()))
        }
        None => (None, None),
    };

    Some(Record {
        name,
        detail_url,
        image_url,
        image_alt,
        row_index,
    })
}

fn first_image<'a>(el: ElementRef<'a>, base: Option<&Url>) -> Option<(String, Option<&'a str>)> {
    el.select(&IMG).find_map(|img| {
        let src = img.value().attr("src")?;
        let src = resolve(src, base)?;
        Some((src, img.value().attr("alt")))
    })
}

/// Resolves `href` against `base`, like a browser does for `a.href` or `img.src`
fn resolve(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok().map(String::from),
        None => Some(href.to_string()),
    }
}
