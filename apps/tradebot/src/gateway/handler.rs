//! Inbound frame dispatch: decode the `msg` tag, update the cache, and route
//! chat and trade events onward.

use serde::de::DeserializeOwned;
use tradebot_common::{Channel, Player, Request};

use crate::error::{BotError, Result};

use super::actor::Dispatcher;
use super::events::{
    CardTypesReply, Envelope, FailReply, FatalFailReply, FriendRequest, FriendRequestUpdateReply,
    GetFriendRequestsReply, GetFriendsReply, LibraryView, Message, ProfileDataInfoReply,
    ProfileInfoReply, ReplyKind, RequestKind, RoomChatMessageReply, RoomInfoReply, TradeEvent,
    TradeOffer, TradeResponseReply, TradeResponseStatus, TradeSide, TradeStatus, TradeViewReply,
    WhisperReply,
};

impl Dispatcher {
    /// Apply one raw frame. Fails only when the server reports a fatal
    /// failure and the session must stop; bad or unknown frames are logged
    /// and skipped.
    pub(crate) async fn apply_reply(&mut self, frame: &str) -> Result<()> {
        let kind = match reply_kind(frame) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(%e, "skipping reply");
                return Ok(());
            }
        };

        if !ReplyKind::QUIET.contains(&kind.as_str()) {
            tracing::debug!("<- {frame}");
        }

        match kind.as_str() {
            ReplyKind::CARD_TYPES => {
                if let Some(v) = parse::<CardTypesReply>(&kind, frame) {
                    tracing::info!(count = v.card_types.len(), "card catalog received");
                    self.update_inventory(|inventory| inventory.learn_card_types(&v.card_types));
                }
            }

            ReplyKind::FAIL => {
                if let Some(v) = parse::<FailReply>(&kind, frame) {
                    if v.op == RequestKind::TRADE_INVITE {
                        self.emit_trade_event(TradeEvent::InviteFailed).await;
                    } else {
                        tracing::warn!(op = %v.op, info = %v.info, "request failed");
                    }
                }
            }

            ReplyKind::FATAL_FAIL => {
                let info = parse::<FatalFailReply>(&kind, frame)
                    .map(|v| v.info)
                    .unwrap_or_default();
                return Err(BotError::Fatal(info));
            }

            ReplyKind::FRIEND_REQUEST_UPDATE => {
                if let Some(v) = parse::<FriendRequestUpdateReply>(&kind, frame) {
                    self.accept_friend_request(v.request).await;
                }
            }

            ReplyKind::GET_FRIEND_REQUESTS => {
                if let Some(v) = parse::<GetFriendRequestsReply>(&kind, frame) {
                    for request in v.requests {
                        self.accept_friend_request(request).await;
                    }
                }
            }

            ReplyKind::GET_FRIENDS => {
                if let Some(v) = parse::<GetFriendsReply>(&kind, frame) {
                    self.update_inventory(|inventory| {
                        for friend in v.friends {
                            inventory.learn_player(friend.profile.name, friend.profile.id);
                        }
                    });
                }
            }

            ReplyKind::LIBRARY_VIEW => {
                if let Some(v) = parse::<LibraryView>(&kind, frame) {
                    self.apply_library(v);
                }
            }

            ReplyKind::PROFILE_DATA_INFO => {
                if let Some(v) = parse::<ProfileDataInfoReply>(&kind, frame) {
                    self.update_inventory(|inventory| inventory.gold = v.profile_data.gold);
                }
            }

            ReplyKind::PROFILE_INFO => {
                if let Some(v) = parse::<ProfileInfoReply>(&kind, frame) {
                    tracing::info!(bot = %v.profile.name, "signed in");
                    self.update_inventory(|inventory| {
                        inventory.bot = v.profile.name.clone();
                        inventory.learn_player(v.profile.name, v.profile.id);
                    });
                    self.send_request(Request::new(RequestKind::LIBRARY_VIEW)).await;
                }
            }

            ReplyKind::ROOM_CHAT_MESSAGE => {
                if let Some(v) = parse::<RoomChatMessageReply>(&kind, frame) {
                    let channel = Channel::room(v.room_name);
                    self.deliver(Message::new(v.text, v.from, channel)).await;
                }
            }

            ReplyKind::ROOM_INFO => {
                if let Some(v) = parse::<RoomInfoReply>(&kind, frame) {
                    self.update_inventory(|inventory| {
                        for player in v.updated {
                            inventory.learn_player(player.name, player.id);
                        }
                    });
                }
            }

            ReplyKind::TRADE_RESPONSE => {
                if let Some(v) = parse::<TradeResponseReply>(&kind, frame) {
                    self.apply_trade_response(v).await;
                }
            }

            ReplyKind::TRADE_VIEW => {
                if let Some(v) = parse::<TradeViewReply>(&kind, frame) {
                    match self.trade_status(v) {
                        Some((partner, status)) => {
                            self.emit_trade_event(TradeEvent::Updated { partner, status }).await
                        }
                        None => tracing::warn!("trade view does not involve us"),
                    }
                }
            }

            ReplyKind::WHISPER => {
                if let Some(v) = parse::<WhisperReply>(&kind, frame) {
                    self.deliver(Message::new(v.text, v.from, Channel::Whisper)).await;
                }
            }

            other if ReplyKind::IGNORED.contains(&other) => {}

            _ => {
                tracing::info!(frame, "unhandled reply");
            }
        }

        Ok(())
    }

    fn apply_library(&mut self, view: LibraryView) {
        let Some(player) = self.inventory.player_for_profile(&view.profile_id).cloned() else {
            tracing::warn!(profile_id = %view.profile_id, "library view for unknown profile");
            return;
        };
        tracing::info!(%player, cards = view.cards.len(), "library updated");
        self.update_inventory(|inventory| inventory.apply_library(player, view));
    }

    async fn accept_friend_request(&mut self, request: FriendRequest) {
        let profile = request.from.profile;
        tracing::info!(player = %profile.name, "accepting friend request");
        self.update_inventory(|inventory| inventory.learn_player(profile.name, profile.id));
        self.send_request(
            Request::new(RequestKind::ACCEPT_FRIEND_REQUEST).with("requestId", request.request.id),
        )
        .await;
    }

    async fn apply_trade_response(&mut self, reply: TradeResponseReply) {
        let bot = &self.inventory.bot;
        let partner = if &reply.from.profile.name == bot {
            reply.to.profile.name
        } else {
            reply.from.profile.name
        };

        let event = match reply.status {
            TradeResponseStatus::Accept => TradeEvent::Started { partner },
            TradeResponseStatus::Decline | TradeResponseStatus::Timeout => {
                TradeEvent::Rejected { partner }
            }
            TradeResponseStatus::Cancel | TradeResponseStatus::CancelBargain => {
                TradeEvent::Cancelled { partner }
            }
            TradeResponseStatus::BargainAccepted => TradeEvent::Completed { partner },
            TradeResponseStatus::Unknown => {
                tracing::debug!(%partner, "ignoring unknown trade response");
                return;
            }
        };
        self.emit_trade_event(event).await;
    }

    /// Turn a trade view into the partner and our-side / their-side card
    /// counts.
    fn trade_status(&self, view: TradeViewReply) -> Option<(Player, TradeStatus)> {
        let bot = &self.inventory.bot;
        let (my, their) = if &view.from.profile.name == bot {
            (view.from, view.to)
        } else if &view.to.profile.name == bot {
            (view.to, view.from)
        } else {
            return None;
        };

        let status = TradeStatus {
            my: self.offer(&my),
            their: self.offer(&their),
        };
        Some((their.profile.name, status))
    }

    fn offer(&self, side: &TradeSide) -> TradeOffer {
        TradeOffer {
            cards: self.inventory.count_cards(&side.cards),
            gold: side.gold,
            accepted: side.accepted,
        }
    }
}

/// Read the `msg` tag of a frame.
fn reply_kind(frame: &str) -> Result<String> {
    if frame.len() < 2 {
        return Err(BotError::ShortFrame(frame.to_string()));
    }
    Ok(serde_json::from_str::<Envelope>(frame)?.msg)
}

fn parse<T: DeserializeOwned>(kind: &str, frame: &str) -> Option<T> {
    match serde_json::from_str(frame) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(%e, kind, "malformed reply payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tradebot_common::Card;

    use crate::gateway::transport::request_channel;

    struct Harness {
        dispatcher: Dispatcher,
        requests: mpsc::Receiver<Request>,
        trades: mpsc::Receiver<TradeEvent>,
    }

    fn harness() -> Harness {
        let (sender, requests) = request_channel();
        let (trade_tx, trades) = mpsc::channel(8);
        let (dispatcher, _snapshots) = Dispatcher::new(sender, trade_tx);
        Harness { dispatcher, requests, trades }
    }

    fn player(name: &str) -> Player {
        Player::from(name)
    }

    const CATALOG: &str = r#"{"msg":"CardTypes","cardTypes":[
        {"id":1,"name":"Grave Robber","rarity":0},
        {"id":2,"name":"Husk","rarity":1}]}"#;

    async fn signed_in(h: &mut Harness) {
        assert!(h.dispatcher.apply_reply(CATALOG).await.is_ok());
        assert!(
            h.dispatcher
                .apply_reply(r#"{"msg":"ProfileInfo","profile":{"id":"bot-1","name":"Bot"}}"#)
                .await
                .is_ok()
        );
        let request = h.requests.recv().await.unwrap();
        assert_eq!(request.op(), Some("LibraryView"));
    }

    #[tokio::test]
    async fn catalog_populates_names_and_rarities() {
        let mut h = harness();
        assert!(h.dispatcher.apply_reply(CATALOG).await.is_ok());

        let inventory = &h.dispatcher.inventory;
        assert_eq!(inventory.card_types.get(&2), Some(&Card::from("Husk")));
        assert_eq!(inventory.rarities.get(&Card::from("Husk")), Some(&1));
    }

    #[tokio::test]
    async fn library_view_rebuilds_bot_stock() {
        let mut h = harness();
        signed_in(&mut h).await;

        let frame = r#"{"msg":"LibraryView","profileId":"bot-1","cards":[
            {"id":10,"typeId":1,"tradable":true},
            {"id":11,"typeId":1,"tradable":true},
            {"id":12,"typeId":2,"tradable":false}]}"#;
        assert!(h.dispatcher.apply_reply(frame).await.is_ok());

        let inventory = &h.dispatcher.inventory;
        let bot = player("Bot");
        assert_eq!(inventory.bot, bot);
        assert_eq!(inventory.count(&bot, &Card::from("Grave Robber")), 2);
        assert_eq!(inventory.count(&bot, &Card::from("Husk")), 0);
    }

    #[tokio::test]
    async fn chat_and_whispers_reach_listeners() {
        let mut h = harness();
        let mut listener = h.dispatcher.registry.add();

        let room = r#"{"msg":"RoomChatMessage","roomName":"clockwork","from":"alice","text":"hi"}"#;
        let whisper = r#"{"msg":"Whisper","from":"bob","toProfileName":"Bot","text":"psst"}"#;
        assert!(h.dispatcher.apply_reply(room).await.is_ok());
        assert!(h.dispatcher.apply_reply(whisper).await.is_ok());

        assert_eq!(
            listener.recv().await.unwrap(),
            Message::new("hi", "alice", Channel::room("clockwork"))
        );
        assert_eq!(
            listener.recv().await.unwrap(),
            Message::new("psst", "bob", Channel::Whisper)
        );
    }

    #[tokio::test]
    async fn fatal_fail_stops_and_garbage_does_not() {
        let mut h = harness();
        assert!(h.dispatcher.apply_reply("").await.is_ok());
        assert!(h.dispatcher.apply_reply("{").await.is_ok());
        assert!(h.dispatcher.apply_reply("not json at all").await.is_ok());
        assert!(h.dispatcher.apply_reply(r#"{"msg":"SomethingNew","x":1}"#).await.is_ok());
        assert!(h.dispatcher.apply_reply(r#"{"msg":"RoomChatMessage"}"#).await.is_ok());
        assert!(matches!(
            h.dispatcher.apply_reply(r#"{"msg":"FatalFail","info":"banned"}"#).await,
            Err(BotError::Fatal(info)) if info == "banned"
        ));
    }

    #[tokio::test]
    async fn failed_trade_invite_is_a_rejection() {
        let mut h = harness();
        assert!(h.dispatcher.apply_reply(r#"{"msg":"Fail","op":"TradeInvite","info":"busy"}"#).await.is_ok());
        assert!(h.dispatcher.apply_reply(r#"{"msg":"Fail","op":"RoomEnter","info":"full"}"#).await.is_ok());

        assert_eq!(h.trades.recv().await.unwrap(), TradeEvent::InviteFailed);
        assert!(h.trades.try_recv().is_err());
    }

    #[tokio::test]
    async fn friend_requests_are_accepted_and_remembered() {
        let mut h = harness();
        let frame = r#"{"msg":"GetFriendRequests","requests":[
            {"request":{"id":7},"from":{"profile":{"id":"a-1","name":"alice"}}}]}"#;
        assert!(h.dispatcher.apply_reply(frame).await.is_ok());

        let request = h.requests.recv().await.unwrap();
        assert_eq!(request.op(), Some("AcceptFriendRequest"));
        assert_eq!(request.get("requestId"), Some(&serde_json::json!(7)));
        assert_eq!(
            h.dispatcher.inventory.player_ids.get(&player("alice")),
            Some(&"a-1".to_string())
        );
    }

    #[tokio::test]
    async fn trade_view_is_split_into_my_and_their_offer() {
        let mut h = harness();
        signed_in(&mut h).await;

        let frame = r#"{"msg":"TradeView","modified":true,
            "from":{"profile":{"id":"a-1","name":"alice"},"cards":[{"id":5,"typeId":2}],"gold":0,"accepted":true},
            "to":{"profile":{"id":"bot-1","name":"Bot"},"cards":[{"id":9,"typeId":1},{"id":8,"typeId":1}],"gold":50,"accepted":false}}"#;
        assert!(h.dispatcher.apply_reply(frame).await.is_ok());

        let TradeEvent::Updated { partner, status } = h.trades.recv().await.unwrap() else {
            panic!("expected a status update");
        };
        assert_eq!(partner, player("alice"));
        assert_eq!(status.their.cards.get(&Card::from("Husk")), Some(&1));
        assert!(status.their.accepted);
        assert_eq!(status.my.cards.get(&Card::from("Grave Robber")), Some(&2));
        assert_eq!(status.my.gold, 50);
    }

    #[tokio::test]
    async fn trade_responses_map_to_events() {
        let mut h = harness();
        signed_in(&mut h).await;

        let response = |status: &str| {
            format!(
                r#"{{"msg":"TradeResponse","status":"{status}","from":{{"profile":{{"id":"bot-1","name":"Bot"}}}},"to":{{"profile":{{"id":"a-1","name":"alice"}}}}}}"#
            )
        };
        for status in ["ACCEPT", "DECLINE", "CANCEL_BARGAIN", "BARGAIN_ACCEPTED", "SOMETHING"] {
            assert!(h.dispatcher.apply_reply(&response(status)).await.is_ok());
        }

        assert_eq!(
            h.trades.recv().await.unwrap(),
            TradeEvent::Started { partner: player("alice") }
        );
        let alice = player("alice");
        assert_eq!(h.trades.recv().await.unwrap(), TradeEvent::Rejected { partner: alice.clone() });
        assert_eq!(h.trades.recv().await.unwrap(), TradeEvent::Cancelled { partner: alice.clone() });
        assert_eq!(h.trades.recv().await.unwrap(), TradeEvent::Completed { partner: alice });
        assert!(h.trades.try_recv().is_err());
    }
}
