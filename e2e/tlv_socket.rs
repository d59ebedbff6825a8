//! Scenario 5 — TLV framing over a Unix stream socket.
//!
//! `START; DATA(tag=1,len=0); CHECK; DATA(tag=0x12, "I am not a stupid
//! protocol!"); END` sent by a client, received by the accepting server
//! side as exactly that sequence of frame classes.

use pipeworks::tlv::Frame;
use pipeworks::{Receiver, Sender, SocketEndpoint, SocketStage, Stage};
use tempfile::tempdir;

#[test]
fn frames_survive_a_unix_socket_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tlv.sock").to_str().unwrap().to_string();

    let mut server = SocketStage::server(SocketEndpoint::UnixPath(path.clone()));
    server.listen(4).unwrap();

    let client_path = path.clone();
    let client_thread = std::thread::spawn(move || {
        let mut client = SocketStage::client(SocketEndpoint::UnixPath(client_path));
        client.open().unwrap();
        let mut sender = Sender::new(&mut client);
        sender.start().unwrap();
        sender.write(1, b"").unwrap();
        sender.check().unwrap();
        sender
            .write(0x12, b"I am not a stupid protocol!")
            .unwrap();
        sender.end().unwrap();
    });

    server.open().unwrap();
    let mut receiver = Receiver::new(&mut server);

    assert_eq!(receiver.receive().unwrap(), Frame::Start);
    assert_eq!(
        receiver.receive().unwrap(),
        Frame::Data {
            tag: 1,
            value: vec![]
        }
    );
    assert_eq!(receiver.receive().unwrap(), Frame::Check);
    assert_eq!(
        receiver.receive().unwrap(),
        Frame::Data {
            tag: 0x12,
            value: b"I am not a stupid protocol!".to_vec()
        }
    );
    assert_eq!(receiver.receive().unwrap(), Frame::End);

    client_thread.join().unwrap();
    server.release().unwrap();
}
