use anyhow::Result;
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::db::DbRequest;

/// An open ticket channel, keyed by its close-control message.
#[derive(Debug, Clone)]
pub struct TicketRecord {
    /// Message ID of the close-control message inside the channel.
    pub message_id: u64,
    pub channel_id: u64,
}

pub fn initialise_tables(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS tickets (
            message_id INTEGER PRIMARY KEY,
            channel_id INTEGER NOT NULL
        );",
    )?;
    Ok(())
}

pub struct InsertTicket {
    pub record: TicketRecord,
}

impl DbRequest for InsertTicket {
    type ReturnValue = Result<()>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        conn.execute(
            "INSERT INTO tickets (message_id, channel_id) VALUES (?1, ?2)",
            params![self.record.message_id, self.record.channel_id],
        )?;
        Ok(())
    }
}

pub struct GetTicket {
    pub message_id: u64,
}

impl DbRequest for GetTicket {
    type ReturnValue = Result<Option<TicketRecord>>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let record = conn
            .query_row(
                "SELECT message_id, channel_id FROM tickets WHERE message_id = ?1",
                params![self.message_id],
                |row| {
                    Ok(TicketRecord {
                        message_id: row.get(0)?,
                        channel_id: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}

pub struct DeleteTicket {
    pub message_id: u64,
}

impl DbRequest for DeleteTicket {
    type ReturnValue = Result<()>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        conn.execute(
            "DELETE FROM tickets WHERE message_id = ?1",
            params![self.message_id],
        )?;
        Ok(())
    }
}

pub struct ListTickets;

impl DbRequest for ListTickets {
    type ReturnValue = Result<Vec<TicketRecord>>;

    fn execute(self, conn: &mut Connection) -> Self::ReturnValue {
        let mut statement =
            conn.prepare("SELECT message_id, channel_id FROM tickets ORDER BY message_id")?;
        let records = statement
            .query_map([], |row| {
                Ok(TicketRecord {
                    message_id: row.get(0)?,
                    channel_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialise_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn tickets_round_trip_through_the_table() {
        let mut conn = test_connection();

        InsertTicket {
            record: TicketRecord {
                message_id: 42,
                channel_id: 7,
            },
        }
        .execute(&mut conn)
        .unwrap();

        let found = GetTicket { message_id: 42 }.execute(&mut conn).unwrap();
        assert_eq!(found.map(|t| t.channel_id), Some(7));

        DeleteTicket { message_id: 42 }.execute(&mut conn).unwrap();
        let found = GetTicket { message_id: 42 }.execute(&mut conn).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn listing_returns_every_open_ticket() {
        let mut conn = test_connection();

        for (message_id, channel_id) in [(3, 30), (1, 10), (2, 20)] {
            InsertTicket {
                record: TicketRecord {
                    message_id,
                    channel_id,
                },
            }
            .execute(&mut conn)
            .unwrap();
        }

        let tickets = ListTickets.execute(&mut conn).unwrap();
        let ids: Vec<_> = tickets.iter().map(|t| t.message_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
