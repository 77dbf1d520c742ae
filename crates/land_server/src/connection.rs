//! Per-connection task.

use std::sync::Arc;

use land_net::{ClientPacket, NetError, PacketReceiver, PacketSender, ServerPacket, Transport};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::world::World;

/// Serve one accepted TCP connection until the peer goes away.
pub async fn serve(world: Arc<World>, stream: TcpStream) {
    let peer = stream.peer_addr().ok();
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%e, "cannot set TCP_NODELAY");
    }
    let (sender, receiver) = Transport::<ClientPacket, ServerPacket>::accept(stream);
    let conn = Uuid::new_v4();
    info!(%conn, ?peer, "client connected");
    run(&world, conn, sender, receiver).await;
    info!(%conn, "client disconnected");
}

/// Handle `conn`'s packets in arrival order, then remove it from the world.
pub async fn run(
    world: &World,
    conn: Uuid,
    sender: PacketSender<ServerPacket>,
    mut receiver: PacketReceiver<ClientPacket>,
) {
    world.register(conn, sender);
    while let Some(item) = receiver.recv().await {
        match item {
            Ok(packet) => world.handle(conn, packet),
            Err(NetError::UnknownTag(tag)) => warn!(%conn, tag, "dropping packet with unknown tag"),
            Err(e) if e.is_packet_error() => warn!(%conn, %e, "dropping malformed packet"),
            Err(e) => warn!(%conn, %e, "dropping inbound error"),
        }
    }
    world.disconnect(conn);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use land_component::MapChunk;
    use land_net::transport::{inbound, outbound, split};
    use land_net::{Packet, WirePacket, tags};

    use super::*;

    #[tokio::test]
    async fn test_session_over_duplex() {
        let world = Arc::new(World::new(MapChunk::bordered(6, 6)));
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (server_tx, server_rx) = split::<ClientPacket, ServerPacket, _>(server_io);
        let conn = Uuid::new_v4();
        let task_world = Arc::clone(&world);
        let server = tokio::spawn(async move { run(&task_world, conn, server_tx, server_rx).await });

        let (tx, mut rx) = split::<ServerPacket, ClientPacket, _>(client_io);
        tx.send(ClientPacket::Connect("alice".to_string())).unwrap();
        tx.send(ClientPacket::GetPlayer).unwrap();

        let mut player = None;
        loop {
            let packet = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            match packet {
                ServerPacket::NewEntity(e) => player = Some(e.id),
                ServerPacket::GetPlayer(id) => {
                    assert_eq!(Some(id), player, "announced before bound");
                    break;
                }
                _ => {}
            }
        }

        drop(tx);
        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(world.client_count(), 0);
        assert!(world.scene().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_packet_keeps_connection() {
        let world = Arc::new(World::new(MapChunk::bordered(6, 6)));
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (server_tx, server_rx) = split::<ClientPacket, ServerPacket, _>(server_io);
        let task_world = Arc::clone(&world);
        tokio::spawn(async move { run(&task_world, Uuid::new_v4(), server_tx, server_rx).await });

        let (mut reader, mut writer) = tokio::io::split(client_io);
        let bad = WirePacket::new(tags::CONNECT, &42u32).unwrap();
        land_net::codec::write_frame(&mut writer, &land_net::encode(&bad).unwrap())
            .await
            .unwrap();
        let good = ClientPacket::Connect("bob".to_string()).to_wire().unwrap();
        land_net::codec::write_frame(&mut writer, &land_net::encode(&good).unwrap())
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), land_net::codec::read_frame(&mut reader))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let wire: WirePacket = land_net::decode(&frame).unwrap();
        assert!(matches!(ServerPacket::from_wire(wire), Ok(ServerPacket::NewEntity(e)) if e.name == "bob"));
    }

    #[tokio::test]
    async fn test_inbound_errors_are_skipped() {
        let world = World::new(MapChunk::bordered(6, 6));
        let (tx, mut rx) = outbound();
        let (feed, receiver) = inbound();
        feed.send(Err(NetError::UnknownTag("dance".to_string()))).await.unwrap();
        feed.send(Err(NetError::Closed)).await.unwrap();
        feed.send(Ok(ClientPacket::Connect("carol".to_string()))).await.unwrap();
        drop(feed);

        run(&world, Uuid::new_v4(), tx, receiver).await;
        assert!(matches!(rx.try_recv(), Ok(ServerPacket::NewEntity(e)) if e.name == "carol"));
        assert!(world.scene().is_empty());
    }
}
