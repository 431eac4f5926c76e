//! Topic name builders for the fixed namespace (spec §6). Centralizing
//! these avoids hand-formatted topic strings drifting apart across crates.

use common::{PeerId, RoomId, ServerId};

pub fn servers() -> String {
    "/hillside/servers".to_string()
}

pub fn server_meta(server: &ServerId) -> String {
    format!("/hillside/servers/{}/meta", server)
}

pub fn server_rooms(server: &ServerId) -> String {
    format!("/hillside/servers/{}/rooms", server)
}

pub fn room_meta(server: &ServerId, room: &RoomId) -> String {
    format!("/hillside/servers/{}/rooms/{}/meta", server, room)
}

pub fn room_chat(server: &ServerId, room: &RoomId) -> String {
    format!("/hillside/servers/{}/rooms/{}/chat", server, room)
}

pub fn room_rekey(server: &ServerId, room: &RoomId) -> String {
    format!("/hillside/servers/{}/rooms/{}/rekey", server, room)
}

pub fn room_members(server: &ServerId, room: &RoomId) -> String {
    format!("/hillside/servers/{}/rooms/{}/members", server, room)
}

pub fn catchup_request(server: &ServerId, room: &RoomId) -> String {
    format!("/hillside/servers/{}/rooms/{}/catchup/request", server, room)
}

/// Per-requester response topic: `.../catchup/<P>`.
pub fn catchup_response(server: &ServerId, room: &RoomId, requester: &PeerId) -> String {
    format!("/hillside/servers/{}/rooms/{}/catchup/{}", server, room, requester)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_strings_match_the_fixed_namespace() {
        let server = ServerId::from("s1");
        let room = RoomId::from("r1");
        let peer = PeerId::from("p1");

        assert_eq!(server_meta(&server), "/hillside/servers/s1/meta");
        assert_eq!(room_chat(&server, &room), "/hillside/servers/s1/rooms/r1/chat");
        assert_eq!(
            catchup_request(&server, &room),
            "/hillside/servers/s1/rooms/r1/catchup/request"
        );
        assert_eq!(
            catchup_response(&server, &room, &peer),
            "/hillside/servers/s1/rooms/r1/catchup/p1"
        );
    }
}
