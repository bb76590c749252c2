use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::upload::UploadedFile;

/// Topic used when nothing has been uploaded yet.
pub const DEFAULT_TOPIC: &str = "Study Skills";

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    Video { duration: String, channel: String },
    Article { read_time: String, source: String },
    Interactive { platform: String, activity: String },
    Book { author: String, pages: u32 },
}

impl ResourceKind {
    pub fn category(&self) -> Category {
        match self {
            ResourceKind::Video { .. } => Category::Video,
            ResourceKind::Article { .. } => Category::Article,
            ResourceKind::Interactive { .. } => Category::Interactive,
            ResourceKind::Book { .. } => Category::Book,
        }
    }

    /// The one-line detail specific to this kind of resource.
    pub fn detail(&self) -> String {
        match self {
            ResourceKind::Video { duration, channel } => format!("{} • {}", channel, duration),
            ResourceKind::Article { read_time, source } => format!("{} • {}", source, read_time),
            ResourceKind::Interactive { platform, activity } => {
                format!("{} • {}", platform, activity)
            }
            ResourceKind::Book { author, pages } => format!("{} • {} pages", author, pages),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Resource {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub topic: String,
    pub rating: f32,
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub kind: ResourceKind,
}

impl Resource {
    fn matches_query(&self, needle: &str) -> bool {
        [&self.title, &self.description, &self.topic]
            .into_iter()
            .chain(self.tags.iter())
            .any(|field| field.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    #[default]
    All,
    Video,
    Article,
    Interactive,
    Book,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::All,
        Category::Video,
        Category::Article,
        Category::Interactive,
        Category::Book,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Category::All => "all",
            Category::Video => "video",
            Category::Article => "article",
            Category::Interactive => "interactive",
            Category::Book => "book",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::All => "All",
            Category::Video => "Videos",
            Category::Article => "Articles",
            Category::Interactive => "Interactive",
            Category::Book => "Books",
        }
    }

    fn admits(&self, resource: &Resource) -> bool {
        *self == Category::All || resource.kind.category() == *self
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let singular = key.strip_suffix('s').unwrap_or(&key);
        Category::ALL
            .into_iter()
            .find(|c| c.key() == key || c.key() == singular)
            .ok_or_else(|| format!("unknown resource category '{}'", s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Every topic across `files`, de-duplicated in first-seen order.
pub fn unique_topics(files: &[UploadedFile]) -> Vec<String> {
    let mut seen = HashSet::new();
    files
        .iter()
        .flat_map(|file| file.topics.iter())
        .filter(|topic| seen.insert(topic.as_str()))
        .cloned()
        .collect()
}

fn slug(topic: &str) -> String {
    let mut slug = String::with_capacity(topic.len());
    for c in topic.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn search_terms(topic: &str) -> String {
    topic.split_whitespace().collect::<Vec<_>>().join("+")
}

fn cluster(index: usize, topic: &str) -> Vec<Resource> {
    let slug = slug(topic);
    let terms = search_terms(topic);
    let lower = topic.to_lowercase();
    let id = |kind: &str, n: u32| format!("r{}-{}-{}-{}", index, slug, kind, n);
    let tags = |extra: &[&str]| -> Vec<String> {
        std::iter::once(lower.clone())
            .chain(extra.iter().map(|t| t.to_string()))
            .collect()
    };

    vec![
        Resource {
            id: id("video", 1),
            title: format!("{} Explained: Complete Introduction", topic),
            description: format!("A beginner-friendly walkthrough of the essentials of {}.", topic),
            url: format!("https://www.youtube.com/results?search_query={}+introduction", terms),
            topic: topic.to_string(),
            rating: 4.8,
            tags: tags(&["introduction", "lecture"]),
            kind: ResourceKind::Video {
                duration: "15:24".to_string(),
                channel: "Study Academy".to_string(),
            },
        },
        Resource {
            id: id("video", 2),
            title: format!("Advanced {} Concepts", topic),
            description: format!("Deep dive into the harder parts of {}, with worked examples.", topic),
            url: format!("https://www.youtube.com/results?search_query=advanced+{}", terms),
            topic: topic.to_string(),
            rating: 4.6,
            tags: tags(&["advanced", "examples"]),
            kind: ResourceKind::Video {
                duration: "28:10".to_string(),
                channel: "Learn Deep".to_string(),
            },
        },
        Resource {
            id: id("article", 1),
            title: format!("A Practical Guide to {}", topic),
            description: format!("Key ideas of {} summarised with diagrams and examples.", topic),
            url: format!("https://en.wikipedia.org/wiki/Special:Search?search={}", terms),
            topic: topic.to_string(),
            rating: 4.5,
            tags: tags(&["guide", "reading"]),
            kind: ResourceKind::Article {
                read_time: "8 min read".to_string(),
                source: "Wikipedia".to_string(),
            },
        },
        Resource {
            id: id("article", 2),
            title: format!("{}: Common Mistakes and How to Avoid Them", topic),
            description: format!("The misconceptions students most often have about {}.", topic),
            url: format!("https://medium.com/search?q={}", terms),
            topic: topic.to_string(),
            rating: 4.3,
            tags: tags(&["mistakes", "tips"]),
            kind: ResourceKind::Article {
                read_time: "5 min read".to_string(),
                source: "Medium".to_string(),
            },
        },
        Resource {
            id: id("interactive", 1),
            title: format!("{} Practice Flashcards", topic),
            description: format!("Test your recall of {} with spaced-repetition flashcards.", topic),
            url: format!("https://quizlet.com/search?query={}", terms),
            topic: topic.to_string(),
            rating: 4.7,
            tags: tags(&["practice", "flashcards"]),
            kind: ResourceKind::Interactive {
                platform: "Quizlet".to_string(),
                activity: "Flashcards".to_string(),
            },
        },
        Resource {
            id: id("book", 1),
            title: format!("Mastering {}", topic),
            description: format!("A comprehensive textbook covering {} from first principles.", topic),
            url: format!("https://openlibrary.org/search?q={}", terms),
            topic: topic.to_string(),
            rating: 4.4,
            tags: tags(&["textbook", "reference"]),
            kind: ResourceKind::Book {
                author: "A. Scholar".to_string(),
                pages: 320,
            },
        },
    ]
}

/// Builds the resource catalog for the uploaded files: one cluster per
/// unique topic, or a single default cluster when nothing was uploaded.
pub fn build_catalog(files: &[UploadedFile]) -> Vec<Resource> {
    let mut topics = unique_topics(files);
    if topics.is_empty() {
        topics.push(DEFAULT_TOPIC.to_string());
    }
    topics
        .iter()
        .enumerate()
        .flat_map(|(index, topic)| cluster(index, topic))
        .collect()
}

/// Resources admitted by both the category and the search query.
pub fn filter<'a>(catalog: &'a [Resource], category: Category, query: &str) -> Vec<&'a Resource> {
    let needle = query.trim().to_lowercase();
    catalog
        .iter()
        .filter(|r| category.admits(r))
        .filter(|r| needle.is_empty() || r.matches_query(&needle))
        .collect()
}

/// The resources page.
#[derive(Debug, Default)]
pub struct ResourceBrowser {
    topics: Vec<String>,
    catalog: Vec<Resource>,
    pub category: Category,
    pub query: String,
    favorites: HashSet<String>,
}

impl ResourceBrowser {
    pub fn new(files: &[UploadedFile]) -> Self {
        let mut browser = Self::default();
        browser.set_files(files);
        browser
    }

    /// Rebuilds the catalog if the file set brought different topics.
    pub fn set_files(&mut self, files: &[UploadedFile]) {
        let topics = unique_topics(files);
        if !self.catalog.is_empty() && topics == self.topics {
            return;
        }
        self.catalog = build_catalog(files);
        self.topics = topics;
    }

    pub fn catalog(&self) -> &[Resource] {
        &self.catalog
    }

    pub fn visible(&self) -> Vec<&Resource> {
        filter(&self.catalog, self.category, &self.query)
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn clear_query(&mut self) {
        self.query.clear();
    }

    /// Flips the favorite flag for `id` and returns the new value.
    pub fn toggle_favorite(&mut self, id: &str) -> bool {
        if self.favorites.remove(id) {
            false
        } else {
            self.favorites.insert(id.to_string());
            true
        }
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites.contains(id)
    }

    pub fn favorite_count(&self) -> usize {
        self.favorites.len()
    }
}
