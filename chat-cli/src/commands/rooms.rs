//! Room management commands.

use anyhow::Result;
use chat_types::RoomId;

use crate::client::{ApiClient, RoomInfo};

/// List the caller's rooms.
pub async fn list(client: &ApiClient) -> Result<()> {
    let rooms = client.my_rooms().await?;
    print_rooms(&rooms, "You do not own any rooms yet.");
    Ok(())
}

/// Search rooms by name.
pub async fn search(client: &ApiClient, query: &str) -> Result<()> {
    let rooms = client.search_rooms(query).await?;
    print_rooms(&rooms, "No rooms match.");
    Ok(())
}

/// Create a room.
pub async fn create(client: &ApiClient, name: &str) -> Result<()> {
    let room = client.create_room(name).await?;
    println!("Created room {} ({})", room.id, room.name);
    println!("Join it with: roomchat join {}", room.id);
    Ok(())
}

/// Show one room.
pub async fn show(client: &ApiClient, room_id: RoomId) -> Result<()> {
    let room = client.room(room_id).await?;
    println!("Room {}:", room.id);
    println!("  Name:   {}", room.name);
    println!("  Owner:  user {}", room.owner_id);
    println!("  Online: {}", room.online.unwrap_or(0));
    Ok(())
}

/// Delete a room.
pub async fn delete(client: &ApiClient, room_id: RoomId) -> Result<()> {
    client.delete_room(room_id).await?;
    println!("Deleted room {}", room_id);
    Ok(())
}

fn print_rooms(rooms: &[RoomInfo], empty: &str) {
    if rooms.is_empty() {
        println!("{}", empty);
        return;
    }
    for line in format_rooms(rooms) {
        println!("{}", line);
    }
}

fn format_rooms(rooms: &[RoomInfo]) -> Vec<String> {
    let width = rooms
        .iter()
        .map(|r| r.id.to_string().len())
        .max()
        .unwrap_or(1);
    rooms
        .iter()
        .map(|r| format!("{:>width$}  {}", r.id.to_string(), r.name, width = width))
        .collect()
}
