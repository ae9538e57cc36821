use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkDecision {
    /// Same host as the page: cancel default navigation and summarize the target.
    Intercept(Url),
    /// Left to normal browser navigation.
    PassThrough,
}

/// Points a link at the page's own host name, keeping path, query and
/// fragment. Only scheme and host name are taken from the page; its port is
/// not carried over. Returns `None` when the href does not parse, is not http(s), or already
/// targets the page host.
pub fn rewrite_to_page_host(href: &str, page_url: &Url) -> Option<String> {
    let target = page_url.join(href).ok()?;
    if !matches!(target.scheme(), "http" | "https") {
        return None;
    }
    let page_host = page_url.host_str()?;
    if target.host_str() == Some(page_host) {
        return None;
    }

    let mut rewritten = format!("{}://{page_host}", page_url.scheme());
    rewritten.push_str(target.path());
    if let Some(query) = target.query() {
        rewritten.push('?');
        rewritten.push_str(query);
    }
    if let Some(fragment) = target.fragment() {
        rewritten.push('#');
        rewritten.push_str(fragment);
    }
    Some(rewritten)
}

pub fn decide_link_click(href: &str, page_url: &Url) -> LinkDecision {
    let Ok(mut target) = page_url.join(href) else {
        return LinkDecision::PassThrough;
    };
    let same_host = target.host_str().is_some() && target.host_str() == page_url.host_str();
    if !same_host {
        return LinkDecision::PassThrough;
    }
    if page_url.scheme() == "https" && target.scheme() == "http" && target.set_scheme("https").is_err() {
        return LinkDecision::PassThrough;
    }
    LinkDecision::Intercept(target)
}
