//! Category members and category trees

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::continuation::Continuation;
use crate::error::{MediaWikiError, PageError, Result};
use crate::mediawiki::{MediaWiki, cache_key};
use crate::page::PageQuery;
use crate::params::Params;

/// The most members a single `categorymembers` request may ask for
const MAX_MEMBERS: usize = 5000;

/// How often fetching a category is retried before giving up
const CATEGORY_TREE_RETRIES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMembers {
    /// Pages and files in the category
    pub pages: Vec<String>,
    /// Sub-categories without the category prefix
    pub subcategories: Vec<String>,
}

/// One category of a [`CategoryTree`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    /// Distance from the root category
    pub depth: usize,
    /// Pages in the category
    pub links: Vec<String>,
    pub parent_categories: Vec<String>,
    /// `None` for sub-categories past the depth limit
    pub sub_categories: BTreeMap<String, Option<CategoryNode>>,
}

/// Categories and their sub-categories, keyed by category name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTree(pub BTreeMap<String, CategoryNode>);

impl CategoryTree {
    pub fn get(&self, category: &str) -> Option<&CategoryNode> {
        self.0.get(category)
    }

    pub fn roots(&self) -> impl Iterator<Item = (&String, &CategoryNode)> {
        self.0.iter()
    }
}

/// What a category was found to contain, kept so every category is fetched once
#[derive(Debug, Clone)]
struct FetchedCategory {
    parent_categories: Vec<String>,
    members: CategoryMembers,
}

impl MediaWiki {
    /// Pages and sub-categories of `category` (given without the category prefix)
    ///
    /// Follows continuations until `results` members are collected; `None` collects all.
    pub fn categorymembers(
        &self,
        category: &str,
        results: Option<usize>,
        subcategories: bool,
    ) -> Result<CategoryMembers> {
        Self::check_query(category, "Category must be specified")?;

        let key = format!("{category} - {results:?} - {subcategories}");

        self.memoized("categorymembers", key, || {
            let prefix = self.category_prefix();

            let params = Params::new()
                .with("list", "categorymembers")
                .with("cmprop", "ids|title|type")
                .with(
                    "cmtype",
                    if subcategories {
                        "page|subcat|file"
                    } else {
                        "page|file"
                    },
                )
                .with("cmlimit", results.map_or(MAX_MEMBERS, |results| results.min(MAX_MEMBERS)))
                .with("cmtitle", format!("{prefix}:{category}"));

            let mut batches = Continuation::new(self, params).describing(category);
            let mut members = CategoryMembers::default();
            let mut pulled = 0;

            while let Some(response) = batches.next() {
                let response = response?;

                let entries = response
                    .pointer("/query/categorymembers")
                    .and_then(Value::as_array)
                    .ok_or_else(|| MediaWikiError::unexpected("no 'categorymembers' list"))?;

                for entry in entries {
                    let Some(title) = entry.get("title").and_then(Value::as_str) else {
                        continue;
                    };

                    match entry.get("type").and_then(Value::as_str) {
                        Some("page" | "file") => members.pages.push(title.to_string()),
                        Some("subcat") => members
                            .subcategories
                            .push(strip_category_prefix(title, prefix).to_string()),
                        _ => {}
                    }
                }

                pulled += entries.len();

                if let Some(results) = results {
                    let remaining = results.saturating_sub(pulled);

                    if remaining == 0 {
                        break;
                    }

                    batches.set_param("cmlimit", remaining.min(MAX_MEMBERS));
                }
            }

            Ok(members)
        })
    }

    /// The tree of sub-categories below each of `categories`
    ///
    /// Each category is expanded `depth` levels deep, or completely with `None`. Categories
    /// below the limit are listed with `None` in place of their node.
    pub fn categorytree(&self, categories: &[&str], depth: Option<usize>) -> Result<CategoryTree> {
        let roots = categories
            .iter()
            .map(|category| category.trim())
            .filter(|category| !category.is_empty())
            .collect::<Vec<_>>();

        if roots.is_empty() {
            return Err(MediaWikiError::InvalidArgument(format!(
                "CategoryTree: Parameter 'category' must either be a list of one or more categories or a string; provided: '{}'",
                categories.join(", ")
            )));
        }

        if depth == Some(0) {
            return Err(MediaWikiError::InvalidArgument(
                "CategoryTree: Parameter 'depth' must be either None (for the full tree) or be greater than 0".to_string(),
            ));
        }

        let key = format!("{} - {depth:?}", cache_key(&roots));

        self.memoized("categorytree", key, || {
            let mut fetched = HashMap::new();
            let mut path = Vec::new();

            let tree = roots
                .iter()
                .map(|category| -> Result<(String, CategoryNode)> {
                    let node = self.category_node(category, depth, 0, &mut fetched, &mut path)?;
                    Ok((category.to_string(), node))
                })
                .collect::<Result<_>>()?;

            Ok(CategoryTree(tree))
        })
    }

    fn category_node(
        &self,
        category: &str,
        depth: Option<usize>,
        level: usize,
        fetched: &mut HashMap<String, FetchedCategory>,
        path: &mut Vec<String>,
    ) -> Result<CategoryNode> {
        if !fetched.contains_key(category) {
            let details = self.fetch_category(category)?;
            fetched.insert(category.to_string(), details);
        }

        let details = fetched
            .get(category)
            .cloned()
            .ok_or_else(|| MediaWikiError::CategoryTree {
                category: category.to_string(),
            })?;

        let mut node = CategoryNode {
            depth: level,
            links: details.members.pages,
            parent_categories: details.parent_categories,
            sub_categories: BTreeMap::new(),
        };

        let expand = depth.is_none_or(|depth| level < depth);

        path.push(category.to_string());

        for sub_category in details.members.subcategories {
            // A category that contains one of its ancestors ends the branch
            let sub_node = if expand && !path.contains(&sub_category) {
                Some(self.category_node(&sub_category, depth, level + 1, fetched, path)?)
            } else {
                None
            };

            node.sub_categories.insert(sub_category, sub_node);
        }

        path.pop();

        Ok(node)
    }

    /// Load a category page and its members, retrying on anything but a missing page
    fn fetch_category(&self, category: &str) -> Result<FetchedCategory> {
        let title = format!("{}:{category}", self.category_prefix());

        let mut tries = 0;

        loop {
            let attempt = self
                .page(PageQuery::title(&title).auto_suggest(false))
                .and_then(|page| {
                    Ok(FetchedCategory {
                        parent_categories: page.categories()?.to_vec(),
                        members: self.categorymembers(category, None, true)?,
                    })
                });

            match attempt {
                Ok(details) => return Ok(details),
                Err(MediaWikiError::Page(_)) => return Err(PageError::Title(title).into()),
                Err(err) if tries < CATEGORY_TREE_RETRIES => {
                    tries += 1;

                    log::warn!("Failed to load '{title}' (attempt {tries}): {err}");

                    std::thread::sleep(self.config().get_rate_limit_min_wait());
                }
                Err(err) => {
                    log::warn!("Giving up on '{title}': {err}");

                    return Err(MediaWikiError::CategoryTree {
                        category: category.to_string(),
                    });
                }
            }
        }
    }
}

fn strip_category_prefix<'a>(title: &'a str, prefix: &str) -> &'a str {
    title
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(title)
}
