use std::collections::BTreeMap;

/// Turns display names into URL-friendly kebab-case slugs
#[derive(Debug, Clone, Default)]
pub struct Slugger {
    special_cases: BTreeMap<String, String>,
}

impl Slugger {
    pub fn new(special_cases: BTreeMap<String, String>) -> Self {
        Self { special_cases }
    }

    pub fn slug(&self, name: &str) -> String {
        if name.is_empty() {
            return String::new();
        }

        // exact match on the raw name
        if let Some(slug) = self.special_cases.get(name) {
            return slug.clone();
        }

        let mut slug = String::with_capacity(name.len());
        for c in name.trim().to_lowercase().chars() {
            match c {
                c if c.is_whitespace() || c == '_' || c == '-' => {
                    if !slug.is_empty() && !slug.ends_with('-') {
                        slug.push('-');
                    }
                }
                'a'..='z' | '0'..='9' => slug.push(c),
                _ => (),
            }
        }
        while slug.ends_with('-') {
            slug.pop();
        }

        slug
    }

    /// Returns the first item whose name slugifies to `slug`
    pub fn find<'a, T, F>(&self, items: &'a [T], slug: &str, name_of: F) -> Option<&'a T>
    where
        F: Fn(&T) -> &str,
    {
        if slug.is_empty() {
            return None;
        }
        items.iter().find(|item| self.slug(name_of(item)) == slug)
    }
}
