use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result};
use rusqlite::{params, Connection};

use crate::models::StoredDrawResult;

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS stored_draw_results (
  chain_id          INTEGER NOT NULL,
  prize_distributor TEXT NOT NULL,
  users_address     TEXT NOT NULL,
  draw_id           INTEGER NOT NULL,
  total_value       TEXT NOT NULL, -- U256 stored as decimal string
  prizes            TEXT NOT NULL, -- JSON array of awardable prizes
  updated_at        TEXT NOT NULL DEFAULT (datetime('now')),
  PRIMARY KEY (chain_id, prize_distributor, users_address, draw_id)
);
"#;

/// Connect to SQLite (with WAL mode for performance)
pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Run schema migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

/// Insert or replace a user's result for one draw
pub fn record_draw_result(
    conn: &Connection,
    chain_id: u64,
    prize_distributor: Address,
    users_address: Address,
    result: &StoredDrawResult,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO stored_draw_results (
            chain_id, prize_distributor, users_address,
            draw_id, total_value, prizes, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
        ON CONFLICT(chain_id, prize_distributor, users_address, draw_id) DO UPDATE SET
            total_value = excluded.total_value,
            prizes      = excluded.prizes,
            updated_at  = excluded.updated_at
        "#,
        params![
            chain_id as i64,
            prize_distributor.to_string().to_lowercase(),
            users_address.to_string().to_lowercase(),
            result.draw_id,
            result.total_value.to_string(),
            serde_json::to_string(&result.prizes)?,
        ],
    )?;
    Ok(())
}

/// All stored results for (network, distributor, user), keyed by draw id
pub fn users_draw_results(
    conn: &Connection,
    chain_id: u64,
    prize_distributor: Address,
    users_address: Address,
) -> Result<BTreeMap<u32, StoredDrawResult>> {
    let mut stmt = conn.prepare(
        "SELECT draw_id, total_value, prizes
         FROM stored_draw_results
         WHERE chain_id = ?1 AND prize_distributor = ?2 AND users_address = ?3
         ORDER BY draw_id ASC",
    )?;

    let rows = stmt.query_map(
        params![
            chain_id as i64,
            prize_distributor.to_string().to_lowercase(),
            users_address.to_string().to_lowercase(),
        ],
        |r| {
            let draw_id: u32 = r.get(0)?;
            let total_value: String = r.get(1)?;
            let prizes: String = r.get(2)?;
            Ok((draw_id, total_value, prizes))
        },
    )?;

    let mut results = BTreeMap::new();
    for row in rows {
        let (draw_id, total_value, prizes) = row?;
        let total_value = total_value
            .parse::<U256>()
            .map_err(|e| eyre!("Corrupt total_value for draw {}: {}", draw_id, e))?;
        results.insert(
            draw_id,
            StoredDrawResult {
                draw_id,
                total_value,
                prizes: serde_json::from_str(&prizes)?,
            },
        );
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrizeAwardable;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = memory();
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn records_and_reads_back_per_user() {
        let conn = memory();
        let distributor = Address::repeat_byte(0xA3);
        let alice = Address::repeat_byte(0x11);
        let bob = Address::repeat_byte(0x22);

        let result = StoredDrawResult {
            draw_id: 4,
            total_value: U256::from(25_000_000u64),
            prizes: vec![PrizeAwardable {
                amount: U256::from(25_000_000u64),
                pick: 3,
                distribution_index: 2,
            }],
        };
        record_draw_result(&conn, 137, distributor, alice, &result).unwrap();
        record_draw_result(
            &conn,
            137,
            distributor,
            bob,
            &StoredDrawResult {
                draw_id: 4,
                total_value: U256::ZERO,
                prizes: Vec::new(),
            },
        )
        .unwrap();

        let alice_results = users_draw_results(&conn, 137, distributor, alice).unwrap();
        assert_eq!(alice_results.get(&4), Some(&result));

        let bob_results = users_draw_results(&conn, 137, distributor, bob).unwrap();
        assert!(bob_results[&4].total_value.is_zero());

        assert!(users_draw_results(&conn, 1, distributor, alice).unwrap().is_empty());
    }

    #[test]
    fn rerecording_replaces_previous_result() {
        let conn = memory();
        let distributor = Address::repeat_byte(0xA3);
        let alice = Address::repeat_byte(0x11);
        for total in [5u64, 9] {
            record_draw_result(
                &conn,
                137,
                distributor,
                alice,
                &StoredDrawResult {
                    draw_id: 1,
                    total_value: U256::from(total),
                    prizes: Vec::new(),
                },
            )
            .unwrap();
        }
        let results = users_draw_results(&conn, 137, distributor, alice).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[&1].total_value, U256::from(9u64));
    }
}
