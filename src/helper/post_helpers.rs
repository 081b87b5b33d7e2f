use crate::helper::sanitization_helpers::{clean_optional, sanitize_markdown_content, strip_all_html};
use crate::models::{Post, PostDraft, PostPatch};
use chrono::{DateTime, Utc};
use pulldown_cmark::{Event, Parser};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

pub const WORDS_PER_MINUTE: usize = 200;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostValidationError {
    #[error("A post needs a title.")]
    MissingTitle,
    #[error("A post needs either content or a PDF.")]
    MissingBody,
    #[error("Could not derive a slug from the title; please provide one.")]
    EmptySlug,
}

struct SlugPatterns {
    disallowed: Regex,
    whitespace: Regex,
    dashes: Regex,
}

fn slug_patterns() -> &'static SlugPatterns {
    static PATTERNS: OnceLock<SlugPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SlugPatterns {
        disallowed: Regex::new(r"[^a-z0-9\s-]").expect("slug pattern is valid"),
        whitespace: Regex::new(r"\s+").expect("slug pattern is valid"),
        dashes: Regex::new(r"-+").expect("slug pattern is valid"),
    })
}

/// URL-safe slug: lowercase, only `[a-z0-9-]`, single dashes, no dashes at the ends.
pub fn generate_slug(title: &str) -> String {
    let patterns = slug_patterns();
    let lowered = title.to_lowercase();
    let stripped = patterns.disallowed.replace_all(lowered.trim(), "");
    let dashed = patterns.whitespace.replace_all(&stripped, "-");
    let collapsed = patterns.dashes.replace_all(&dashed, "-");
    collapsed.trim_matches('-').to_string()
}

/// Minutes to read at 200 words per minute, never less than one.
pub fn estimate_read_time(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    std::cmp::max(1, words.div_ceil(WORDS_PER_MINUTE)) as u32
}

/// Plain text of a markdown body, cut at `max_chars` with a trailing "...".
pub fn plain_text_excerpt(markdown: &str, max_chars: usize) -> String {
    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak | Event::End(_) => text.push(' '),
            _ => {}
        }
    }
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.chars().count() <= max_chars {
        return normalized;
    }
    let cut: String = normalized.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Excerpt shown in feeds and emails: the stored excerpt, else the start of the body.
pub fn summary_for(post: &Post, max_chars: usize) -> String {
    if let Some(excerpt) = post.excerpt.as_deref().filter(|e| !e.trim().is_empty()) {
        return excerpt.to_string();
    }
    match post.content.as_deref() {
        Some(content) => plain_text_excerpt(content, max_chars),
        None => String::new(),
    }
}

fn clean_body(content: Option<&str>) -> Option<String> {
    content
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(sanitize_markdown_content)
}

fn validate(post: &Post) -> Result<(), PostValidationError> {
    if post.title.is_empty() {
        return Err(PostValidationError::MissingTitle);
    }
    if post.content.is_none() && post.pdf_url.is_none() {
        return Err(PostValidationError::MissingBody);
    }
    if post.slug.is_empty() {
        return Err(PostValidationError::EmptySlug);
    }
    Ok(())
}

/// Builds a validated post from a creation payload.
pub fn build_post(id: &str, draft: &PostDraft, now: DateTime<Utc>) -> Result<Post, PostValidationError> {
    let title = strip_all_html(&draft.title);
    let slug = match draft.slug.as_deref().map(generate_slug).filter(|s| !s.is_empty()) {
        Some(slug) => slug,
        None => generate_slug(&title),
    };
    let content = clean_body(draft.content.as_deref());
    let post = Post {
        id: id.to_string(),
        read_time_min: content.as_deref().map(estimate_read_time).unwrap_or(1),
        title,
        category: draft.category,
        slug,
        excerpt: clean_optional(draft.excerpt.as_deref()),
        content,
        pdf_url: clean_optional(draft.pdf_url.as_deref()),
        cover_url: clean_optional(draft.cover_url.as_deref()),
        is_published: draft.is_published,
        uploaded_at: now,
        published_at: draft.is_published.then_some(now),
        updated_at: now,
    };
    validate(&post)?;
    Ok(post)
}

/// Merges a patch into an existing post. `published_at` is set on the
/// first transition to published and kept afterwards.
pub fn apply_patch(existing: &Post, patch: &PostPatch, now: DateTime<Utc>) -> Result<Post, PostValidationError> {
    let mut post = existing.clone();
    if let Some(title) = &patch.title {
        post.title = strip_all_html(title);
    }
    if let Some(category) = patch.category {
        post.category = category;
    }
    if let Some(slug) = &patch.slug {
        post.slug = generate_slug(slug);
    }
    if let Some(excerpt) = &patch.excerpt {
        post.excerpt = clean_optional(Some(excerpt));
    }
    if let Some(content) = &patch.content {
        post.content = clean_body(Some(content));
        post.read_time_min = post.content.as_deref().map(estimate_read_time).unwrap_or(1);
    }
    if let Some(pdf_url) = &patch.pdf_url {
        post.pdf_url = clean_optional(Some(pdf_url));
    }
    if let Some(cover_url) = &patch.cover_url {
        post.cover_url = clean_optional(Some(cover_url));
    }
    if let Some(is_published) = patch.is_published {
        if is_published && post.published_at.is_none() {
            post.published_at = Some(now);
        }
        post.is_published = is_published;
    }
    post.updated_at = now;
    validate(&post)?;
    Ok(post)
}

/// True when the change moves a post from draft to published.
pub fn became_published(before: Option<&Post>, after: &Post) -> bool {
    after.is_published && !before.map(|p| p.is_published).unwrap_or(false)
}
