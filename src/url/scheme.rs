use crate::UrlError;

/// Schemes a documentation site may be served under by default
pub const DEFAULT_SCHEMES: &[&str] = &["http", "https"];

/// An ordered set of URL schemes treated as interchangeable
///
/// Start and stop URLs are written with one scheme, but the live site may
/// redirect across schemes. Rules built from this set match a URL under any of
/// its schemes, and failed requests can be retried under the sibling schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeSet {
    schemes: Vec<String>,
}

impl SchemeSet {
    /// Creates a scheme set; duplicates are dropped, first occurrence wins
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for scheme in schemes {
            let scheme = scheme.into();
            if !unique.contains(&scheme) {
                unique.push(scheme);
            }
        }
        Self { schemes: unique }
    }

    pub fn schemes(&self) -> &[String] {
        &self.schemes
    }

    /// Splits `url` into its configured scheme and the remainder after it
    ///
    /// The longest configured scheme followed by `:` wins, so `https://` is
    /// never read as `http` + `s://`.
    fn split_scheme<'a>(&self, url: &'a str) -> Option<(&'a str, &'a str)> {
        self.schemes
            .iter()
            .filter(|scheme| {
                url.len() > scheme.len()
                    && url.starts_with(scheme.as_str())
                    && url[scheme.len()..].starts_with(':')
            })
            .max_by_key(|scheme| scheme.len())
            .map(|scheme| url.split_at(scheme.len()))
    }

    /// Returns a regex pattern matching `url` under any scheme in the set
    ///
    /// Strings without a configured scheme prefix (e.g. path-only deny rules)
    /// are returned unchanged. The remainder of the URL is kept verbatim, so
    /// regex syntax in configured stop URLs keeps working.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsearch_scraper::url::SchemeSet;
    ///
    /// let schemes = SchemeSet::default();
    /// assert_eq!(
    ///     schemes.to_scheme_agnostic("https://docs.example.com/archive"),
    ///     "^(?:http|https)://docs.example.com/archive(.*)$"
    /// );
    /// assert_eq!(schemes.to_scheme_agnostic("/archive/"), "/archive/");
    /// ```
    pub fn to_scheme_agnostic(&self, url: &str) -> String {
        match self.split_scheme(url) {
            Some((_, rest)) => {
                let alternation = self
                    .schemes
                    .iter()
                    .map(|s| regex::escape(s))
                    .collect::<Vec<_>>()
                    .join("|");
                format!("^(?:{}){}(.*)$", alternation, rest)
            }
            None => url.to_string(),
        }
    }

    /// Returns `url` rewritten under every other scheme in the set
    ///
    /// The remainder of the URL is preserved verbatim. Fails if `url` does not
    /// start with a configured scheme.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsearch_scraper::url::SchemeSet;
    ///
    /// let others = SchemeSet::default()
    ///     .alternate_schemes("https://docs.example.com/")
    ///     .unwrap();
    /// assert_eq!(others, vec!["http://docs.example.com/".to_string()]);
    /// ```
    pub fn alternate_schemes(&self, url: &str) -> Result<Vec<String>, UrlError> {
        let (current, rest) = self
            .split_scheme(url)
            .ok_or_else(|| UrlError::InvalidScheme(url.to_string()))?;

        Ok(self
            .schemes
            .iter()
            .filter(|scheme| scheme.as_str() != current)
            .map(|scheme| format!("{}{}", scheme, rest))
            .collect())
    }
}

impl Default for SchemeSet {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMES.iter().copied())
    }
}

/// [`SchemeSet::to_scheme_agnostic`] over the default `{http, https}` set
pub fn to_scheme_agnostic(url: &str) -> String {
    SchemeSet::default().to_scheme_agnostic(url)
}

/// [`SchemeSet::alternate_schemes`] over the default `{http, https}` set
pub fn alternate_schemes(url: &str) -> Result<Vec<String>, UrlError> {
    SchemeSet::default().alternate_schemes(url)
}
