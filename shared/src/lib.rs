pub mod comment_tree;
pub mod error;
pub mod votes;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use comment_tree::{
    build_comment_tree, can_reply, CommentForest, CommentTree, Threaded, MAX_REPLY_DEPTH,
};
pub use error::ModelError;
pub use votes::{
    cast_vote, PendingVote, StoreMutation, VoteCounters, VoteError, VoteTally, VoteTransition,
};

pub const MAX_TITLE_CHARS: usize = 200;

/// Implements `as_str`, `Display` and `FromStr` over the snake_case names
/// used on the wire and in storage.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ModelError::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

// ── Profiles ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    SuperAdmin,
}

string_enum!(Role { User => "user", SuperAdmin => "super_admin" });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub username: Option<String>,
    pub avatar: Option<String>,
}

/// Display fields of a content author. Both may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub username: Option<String>,
    pub avatar: Option<String>,
}

impl Author {
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("anonymous")
    }
}

// ── Ideas ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    #[default]
    Planning,
    InProgress,
    Completed,
    Abandoned,
}

string_enum!(IdeaStatus {
    Planning => "planning",
    InProgress => "in_progress",
    Completed => "completed",
    Abandoned => "abandoned",
});

impl IdeaStatus {
    pub fn label(&self) -> &'static str {
        match self {
            IdeaStatus::Planning => "Planning",
            IdeaStatus::InProgress => "In progress",
            IdeaStatus::Completed => "Completed",
            IdeaStatus::Abandoned => "Abandoned",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

string_enum!(Visibility { Public => "public", Private => "private" });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub status: IdeaStatus,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Idea {
    /// Private ideas are only readable by their owner.
    pub fn is_readable_by(&self, viewer: Option<Uuid>) -> bool {
        match self.visibility {
            Visibility::Public => true,
            Visibility::Private => viewer == Some(self.user_id),
        }
    }

    pub fn was_edited(&self) -> bool {
        self.updated_at != self.created_at
    }
}

/// Read-only projection of an idea with its author and aggregate counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaWithStats {
    #[serde(flatten)]
    pub idea: Idea,
    pub author_username: Option<String>,
    pub author_avatar: Option<String>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub comment_count: i64,
}

impl IdeaWithStats {
    pub fn counters(&self) -> VoteCounters {
        VoteCounters::new(self.upvotes, self.downvotes)
    }

    pub fn vote_score(&self) -> i64 {
        self.counters().score()
    }

    pub fn author(&self) -> Author {
        Author {
            username: self.author_username.clone(),
            avatar: self.author_avatar.clone(),
        }
    }
}

/// An idea as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaView {
    #[serde(flatten)]
    pub stats: IdeaWithStats,
    pub vote_score: i64,
    pub user_vote: Option<VoteType>,
}

impl IdeaView {
    pub fn new(stats: IdeaWithStats, user_vote: Option<VoteType>) -> Self {
        let vote_score = stats.vote_score();
        Self {
            stats,
            vote_score,
            user_vote,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Score,
    CommentCount,
}

string_enum!(IdeaSort {
    CreatedAt => "created_at",
    UpdatedAt => "updated_at",
    Score => "score",
    CommentCount => "comment_count",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaTab {
    #[default]
    All,
    Public,
    Private,
}

string_enum!(IdeaTab { All => "all", Public => "public", Private => "private" });

impl IdeaTab {
    pub fn visibility(&self) -> Option<Visibility> {
        match self {
            IdeaTab::All => None,
            IdeaTab::Public => Some(Visibility::Public),
            IdeaTab::Private => Some(Visibility::Private),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIdea {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub status: IdeaStatus,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateIdea {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<IdeaStatus>,
    pub visibility: Option<Visibility>,
}

// ── Comments ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub idea_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Author,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// A comment placed in its thread; roots have depth 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadEntry {
    pub depth: usize,
    #[serde(flatten)]
    pub comment: CommentWithAuthor,
}

/// Wire form of a comment forest: a flat pre-order listing, so nesting never
/// shows up as JSON depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentThread {
    pub comments: Vec<ThreadEntry>,
    pub total: usize,
}

impl CommentThread {
    pub fn from_forest(forest: &CommentForest<CommentWithAuthor>) -> Self {
        let comments: Vec<ThreadEntry> = forest
            .iter_depth_first()
            .map(|(depth, node)| ThreadEntry {
                depth,
                comment: node.comment.clone(),
            })
            .collect();
        CommentThread {
            total: comments.len(),
            comments,
        }
    }
}

// ── Votes ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteType {
    Up,
    Down,
}

string_enum!(VoteType { Up => "up", Down => "down" });

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVote {
    pub vote_type: VoteType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub user_vote: Option<VoteType>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub vote_score: i64,
}

impl VoteResponse {
    pub fn new(user_vote: Option<VoteType>, counters: VoteCounters) -> Self {
        Self {
            user_vote,
            upvotes: counters.upvotes,
            downvotes: counters.downvotes,
            vote_score: counters.score(),
        }
    }

    pub fn counters(&self) -> VoteCounters {
        VoteCounters::new(self.upvotes, self.downvotes)
    }
}

// ── Admin ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_ideas: i64,
    pub total_comments: i64,
    pub total_votes: i64,
    pub recent_ideas: Vec<IdeaWithStats>,
    pub recent_users: Vec<Profile>,
}

// ── Errors on the wire ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_url: Option<String>,
}

// ── Validation ──

/// Trims `value` and rejects it if nothing is left.
pub fn validate_text(field: &'static str, value: &str) -> Result<String, ModelError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ModelError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

pub fn validate_title(value: &str) -> Result<String, ModelError> {
    let title = validate_text("title", value)?;
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(ModelError::TooLong {
            field: "title",
            max: MAX_TITLE_CHARS,
        });
    }
    Ok(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_their_own_names() {
        for status in IdeaStatus::ALL {
            assert_eq!(status.as_str().parse::<IdeaStatus>().unwrap(), *status);
        }
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("down".parse::<VoteType>().unwrap(), VoteType::Down);
    }

    #[test]
    fn unknown_enum_value_is_rejected() {
        let err = "sideways".parse::<VoteType>().unwrap_err();
        assert_eq!(
            err,
            ModelError::UnknownVariant {
                kind: "VoteType",
                value: "sideways".to_string()
            }
        );
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&IdeaStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let sort: IdeaSort = serde_json::from_str("\"comment_count\"").unwrap();
        assert_eq!(sort, IdeaSort::CommentCount);
    }

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(validate_text("content", "   \n"), Err(ModelError::EmptyField("content")));
        assert_eq!(validate_text("content", "  hi  ").unwrap(), "hi");
    }

    #[test]
    fn long_title_is_rejected() {
        let title = "x".repeat(MAX_TITLE_CHARS + 1);
        assert!(matches!(validate_title(&title), Err(ModelError::TooLong { .. })));
        assert!(validate_title(&"x".repeat(MAX_TITLE_CHARS)).is_ok());
    }

    #[test]
    fn private_idea_only_readable_by_owner() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let idea = Idea {
            id: Uuid::new_v4(),
            user_id: owner,
            title: "t".into(),
            content: "c".into(),
            status: IdeaStatus::Planning,
            visibility: Visibility::Private,
            created_at: now,
            updated_at: now,
        };
        assert!(idea.is_readable_by(Some(owner)));
        assert!(!idea.is_readable_by(Some(Uuid::new_v4())));
        assert!(!idea.is_readable_by(None));
    }

    #[test]
    fn idea_view_score_follows_counters() {
        let now = Utc::now();
        let stats = IdeaWithStats {
            idea: Idea {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                title: "t".into(),
                content: "c".into(),
                status: IdeaStatus::Completed,
                visibility: Visibility::Public,
                created_at: now,
                updated_at: now,
            },
            author_username: None,
            author_avatar: None,
            upvotes: 7,
            downvotes: 9,
            comment_count: 0,
        };
        let view = IdeaView::new(stats, Some(VoteType::Down));
        assert_eq!(view.vote_score, -2);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["vote_score"], -2);
        assert_eq!(json["status"], "completed");
        assert_eq!(json["user_vote"], "down");
    }

    fn chain(len: u128) -> Vec<CommentWithAuthor> {
        let at = Utc::now();
        (1..=len)
            .map(|n| CommentWithAuthor {
                comment: Comment {
                    id: Uuid::from_u128(n),
                    idea_id: Uuid::from_u128(0x1dea),
                    user_id: Uuid::from_u128(0xa11ce),
                    parent_id: (n > 1).then(|| Uuid::from_u128(n - 1)),
                    content: format!("level {n}"),
                    created_at: at,
                    updated_at: at,
                },
                author: Author::default(),
            })
            .collect()
    }

    #[test]
    fn thread_lists_comments_in_pre_order_with_depths() {
        let mut rows = chain(2);
        let mut second_root = chain(1).remove(0);
        second_root.comment.id = Uuid::from_u128(99);
        second_root.comment.content = "second".into();
        rows.push(second_root);

        let thread = CommentThread::from_forest(&build_comment_tree(rows));
        let walk: Vec<(usize, &str)> = thread
            .comments
            .iter()
            .map(|e| (e.depth, e.comment.comment.content.as_str()))
            .collect();
        assert_eq!(walk, vec![(0, "level 1"), (1, "level 2"), (0, "second")]);
        assert_eq!(thread.total, 3);

        let json = serde_json::to_value(&thread).unwrap();
        assert_eq!(json["comments"][1]["depth"], 1);
        assert_eq!(json["comments"][1]["parent_id"], Uuid::from_u128(1).to_string());
    }

    #[test]
    fn deep_thread_survives_the_wire() {
        let depth = 5_000;
        let thread = CommentThread::from_forest(&build_comment_tree(chain(depth)));

        let json = serde_json::to_string(&thread).unwrap();
        let back: CommentThread = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total, depth as usize);
        assert_eq!(back.comments.last().map(|e| e.depth), Some(depth as usize - 1));
    }
}
