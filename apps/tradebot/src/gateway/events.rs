//! Reply frames, chat messages, and trade events carried over the connection.

use std::collections::BTreeMap;

use serde::Deserialize;
use tradebot_common::{Card, CardId, Channel, Player};

// ---------------------------------------------------------------------------
// Reply kinds
// ---------------------------------------------------------------------------

/// Reply kinds the dispatcher understands, by their `msg` tag.
pub struct ReplyKind;

impl ReplyKind {
    pub const CARD_TYPES: &'static str = "CardTypes";
    pub const FAIL: &'static str = "Fail";
    pub const FATAL_FAIL: &'static str = "FatalFail";
    pub const FRIEND_REQUEST_UPDATE: &'static str = "FriendRequestUpdate";
    pub const GET_FRIEND_REQUESTS: &'static str = "GetFriendRequests";
    pub const GET_FRIENDS: &'static str = "GetFriends";
    pub const LIBRARY_VIEW: &'static str = "LibraryView";
    pub const OK: &'static str = "Ok";
    pub const PING: &'static str = "Ping";
    pub const PROFILE_DATA_INFO: &'static str = "ProfileDataInfo";
    pub const PROFILE_INFO: &'static str = "ProfileInfo";
    pub const ROOM_CHAT_MESSAGE: &'static str = "RoomChatMessage";
    pub const ROOM_ENTER: &'static str = "RoomEnter";
    pub const ROOM_INFO: &'static str = "RoomInfo";
    pub const TRADE_RESPONSE: &'static str = "TradeResponse";
    pub const TRADE_VIEW: &'static str = "TradeView";
    pub const WHISPER: &'static str = "Whisper";

    /// Kinds with large, uninteresting bodies that are not echoed to the log.
    pub const QUIET: [&'static str; 4] = ["AvatarTypes", "CardTypes", "AchievementTypes", "LibraryView"];

    /// Kinds that are known and deliberately ignored.
    pub const IGNORED: [&'static str; 10] = [
        "AchievementTypes",
        "AchievementUnlocked",
        "ActiveGame",
        "AvatarTypes",
        "FriendUpdate",
        "GetBlockedPersons",
        "Ok",
        "Ping",
        "RoomEnter",
        "ServerInfo",
    ];
}

/// Outbound operation names.
pub struct RequestKind;

impl RequestKind {
    pub const ACCEPT_FRIEND_REQUEST: &'static str = "AcceptFriendRequest";
    pub const CARD_TYPES: &'static str = "CardTypes";
    pub const GET_FRIENDS: &'static str = "GetFriends";
    pub const JOIN_LOBBY: &'static str = "JoinLobby";
    pub const LIBRARY_VIEW: &'static str = "LibraryView";
    pub const PING: &'static str = "Ping";
    pub const ROOM_CHAT_MESSAGE: &'static str = "RoomChatMessage";
    pub const ROOM_ENTER: &'static str = "RoomEnter";
    pub const ROOM_EXIT: &'static str = "RoomExit";
    pub const SIGN_IN: &'static str = "SignIn";
    pub const TRADE_ACCEPT_BARGAIN: &'static str = "TradeAcceptBargain";
    pub const TRADE_CANCEL: &'static str = "TradeCancel";
    pub const TRADE_INVITE: &'static str = "TradeInvite";
    pub const WHISPER: &'static str = "Whisper";
}

/// Just the tag of a frame, decoded before the full payload.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub msg: String,
}

// ---------------------------------------------------------------------------
// Shared payload pieces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: Player,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRef {
    pub profile: Profile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryCard {
    pub id: u64,
    pub type_id: CardId,
    #[serde(default)]
    pub tradable: bool,
}

// ---------------------------------------------------------------------------
// Reply payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CardType {
    pub id: CardId,
    pub name: Card,
    #[serde(default)]
    pub rarity: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardTypesReply {
    pub card_types: Vec<CardType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryView {
    pub profile_id: String,
    #[serde(default)]
    pub cards: Vec<LibraryCard>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileInfoReply {
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
pub struct ProfileData {
    pub gold: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDataInfoReply {
    pub profile_data: ProfileData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomChatMessageReply {
    pub room_name: String,
    pub from: Player,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct WhisperReply {
    pub from: Player,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfoReply {
    #[serde(default)]
    pub updated: Vec<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct GetFriendsReply {
    #[serde(default)]
    pub friends: Vec<ProfileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestId {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FriendRequest {
    pub request: RequestId,
    pub from: ProfileRef,
}

#[derive(Debug, Deserialize)]
pub struct GetFriendRequestsReply {
    #[serde(default)]
    pub requests: Vec<FriendRequest>,
}

#[derive(Debug, Deserialize)]
pub struct FriendRequestUpdateReply {
    pub request: FriendRequest,
}

#[derive(Debug, Deserialize)]
pub struct FailReply {
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub info: String,
}

#[derive(Debug, Deserialize)]
pub struct FatalFailReply {
    #[serde(default)]
    pub info: String,
}

/// Server-side state of a trade invite or session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeResponseStatus {
    Accept,
    Decline,
    Timeout,
    Cancel,
    CancelBargain,
    BargainAccepted,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct TradeResponseReply {
    pub status: TradeResponseStatus,
    pub from: ProfileRef,
    pub to: ProfileRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeSide {
    pub profile: Profile,
    #[serde(default)]
    pub cards: Vec<LibraryCard>,
    #[serde(default)]
    pub gold: i64,
    #[serde(default)]
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct TradeViewReply {
    #[serde(default)]
    pub modified: bool,
    pub from: TradeSide,
    pub to: TradeSide,
}

// ---------------------------------------------------------------------------
// Decoded events
// ---------------------------------------------------------------------------

/// A chat or whisper line, fanned out to every listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub from: Player,
    pub channel: Channel,
}

impl Message {
    pub fn new(text: impl Into<String>, from: impl Into<Player>, channel: Channel) -> Self {
        Self {
            text: text.into(),
            from: from.into(),
            channel,
        }
    }
}

/// Card counts per card name.
pub type CardCounts = BTreeMap<Card, u32>;

/// One side of an ongoing negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeOffer {
    pub cards: CardCounts,
    pub gold: i64,
    pub accepted: bool,
}

impl TradeOffer {
    pub fn is_empty(&self) -> bool {
        self.cards.values().all(|n| *n == 0) && self.gold == 0
    }
}

/// Snapshot of both offers during one negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeStatus {
    pub my: TradeOffer,
    pub their: TradeOffer,
}

/// Trade-related signals routed from the reply decoder to the trade task.
///
/// Every event names the player on the other side, so the trade task can
/// drop late events from an earlier negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeEvent {
    /// The partner accepted our invite and a session is open.
    Started { partner: Player },
    Updated { partner: Player, status: TradeStatus },
    /// Both sides accepted; the last `Updated` status is final.
    Completed { partner: Player },
    Cancelled { partner: Player },
    /// The invite was declined or timed out.
    Rejected { partner: Player },
    /// The server refused to send our last invite. Carries no partner.
    InviteFailed,
}

impl TradeEvent {
    pub fn partner(&self) -> Option<&Player> {
        match self {
            Self::Started { partner }
            | Self::Updated { partner, .. }
            | Self::Completed { partner }
            | Self::Cancelled { partner }
            | Self::Rejected { partner } => Some(partner),
            Self::InviteFailed => None,
        }
    }
}
