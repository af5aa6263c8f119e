use std::{collections::HashMap, path::Path};

use sqlx::{
    migrate::MigrateDatabase,
    prelude::FromRow,
    query,
    sqlite::{Sqlite, SqlitePoolOptions},
    SqlitePool,
};

use crate::{
    core::{
        congress::{Congress, NewCongress},
        player::{NewPlayer, Player},
        round::{self, NewRound, Round, RoundPlayer, UpdateRound},
    },
    error::{Error, Result},
};

/// A result row tagged with the round it belongs to
#[derive(FromRow)]
struct RoundRow {
    round_id: i64,
    #[sqlx(flatten)]
    player: RoundPlayer,
}

pub struct LeagueDb {
    db: SqlitePool,
}

impl LeagueDb {
    /// Opens (creating if needed) the database file and its tables.
    pub async fn init(file: &Path) -> anyhow::Result<Self> {
        let url = format!("sqlite://{}", file.display());
        if !Sqlite::database_exists(&url).await? {
            Sqlite::create_database(&url).await?;
        }

        let db = SqlitePool::connect(&url).await?;
        let league = LeagueDb { db };
        league.create_tables().await?;
        Ok(league)
    }

    pub async fn load(file: &Path) -> anyhow::Result<Self> {
        let url = format!("sqlite://{}", file.display());
        if !Sqlite::database_exists(&url).await? {
            anyhow::bail!("No database at {}, run `init` first", file.display());
        }

        let db = SqlitePool::connect(&url).await?;
        Ok(LeagueDb { db })
    }

    /// A private in-memory database. A single connection keeps every query on
    /// the same memory store.
    #[cfg(test)]
    pub async fn memory() -> anyhow::Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let league = LeagueDb { db };
        league.create_tables().await?;
        Ok(league)
    }

    async fn create_tables(&self) -> anyhow::Result<()> {
        query(
            "create table if not exists players(
                        player_tag text primary key not null,
                        real_name text not null,
                        monkey_preference integer not null,
                        profile_picture_id integer not null,
                        date_added integer not null
                    );",
        )
        .execute(&self.db)
        .await?;

        query(
            "create table if not exists congresses(
                        congress_id integer primary key autoincrement,
                        name text not null,
                        date text not null,
                        location text,
                        notes text
            );",
        )
        .execute(&self.db)
        .await?;

        query(
            "create table if not exists congress_players(
                        congress_id integer not null,
                        player_tag text not null,
                        primary key(congress_id, player_tag),
                        foreign key(congress_id) references congresses(congress_id) on delete cascade,
                        foreign key(player_tag) references players(player_tag) on delete cascade
            );",
        )
        .execute(&self.db)
        .await?;

        query(
            "create table if not exists rounds(
                    round_id integer primary key autoincrement,
                    congress_id integer not null,
                    difficulty text not null,
                    round_order integer not null,
                    foreign key(congress_id) references congresses(congress_id) on delete cascade
                );",
        )
        .execute(&self.db)
        .await?;

        query(
            "create table if not exists round_players(
                    round_id integer not null,
                    player_tag text not null,
                    stage_reached integer not null,
                    lives_lost integer not null,
                    extra_stages integer not null,
                    monkey_used integer not null,
                    tiebreaker_points integer,
                    final_rank integer,
                    primary key(round_id, player_tag),
                    foreign key(round_id) references rounds(round_id) on delete cascade,
                    foreign key(player_tag) references players(player_tag) on delete cascade
                );",
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn get_players(&self) -> Result<Vec<Player>> {
        Ok(sqlx::query_as(
            "select player_tag, real_name, monkey_preference, profile_picture_id, date_added
                        from players
                        order by date_added desc, rowid desc",
        )
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn find_player(&self, tag: &str) -> Result<Player> {
        sqlx::query_as("select * from players where player_tag = ? limit 1")
            .bind(tag)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("Unknown player {}", tag)))
    }

    pub async fn add_player(&self, player: NewPlayer) -> Result<Player> {
        let player = player.validate()?;
        log::debug!("Creating new player {}", player.player_tag);

        let existing: i64 = sqlx::query_scalar("select count(*) from players where player_tag = ?")
            .bind(&player.player_tag)
            .fetch_one(&self.db)
            .await?;
        if existing > 0 {
            return Err(Error::validation("Player tag already exists"));
        }

        let date_added = time::OffsetDateTime::now_utc();
        sqlx::query(
            "insert into players(player_tag, real_name, monkey_preference, profile_picture_id, date_added)
                        values(?, ?, ?, ?, ?)",
        )
        .bind(&player.player_tag)
        .bind(&player.real_name)
        .bind(player.monkey_preference)
        .bind(player.profile_picture_id)
        .bind(date_added.unix_timestamp())
        .execute(&self.db)
        .await?;

        self.find_player(&player.player_tag).await
    }

    async fn get_rosters(&self) -> Result<HashMap<i64, Vec<String>>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "select congress_id, player_tag from congress_players order by rowid",
        )
        .fetch_all(&self.db)
        .await?;

        let mut rosters: HashMap<i64, Vec<String>> = HashMap::new();
        for (congress_id, tag) in rows {
            rosters.entry(congress_id).or_default().push(tag);
        }
        Ok(rosters)
    }

    pub async fn get_congresses(&self) -> Result<Vec<Congress>> {
        let mut congresses: Vec<Congress> =
            sqlx::query_as("select * from congresses order by date desc, congress_id desc")
                .fetch_all(&self.db)
                .await?;

        let mut rosters = self.get_rosters().await?;
        for congress in &mut congresses {
            congress.players = rosters.remove(&congress.congress_id).unwrap_or_default();
        }
        Ok(congresses)
    }

    pub async fn get_congress(&self, congress_id: i64) -> Result<Congress> {
        let mut congress: Congress =
            sqlx::query_as("select * from congresses where congress_id = ? limit 1")
                .bind(congress_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| Error::not_found("Congress not found"))?;

        congress.players = sqlx::query_scalar(
            "select player_tag from congress_players where congress_id = ? order by rowid",
        )
        .bind(congress_id)
        .fetch_all(&self.db)
        .await?;

        Ok(congress)
    }

    /// Players on a congress roster with their full records, in roster order.
    pub async fn get_congress_players(&self, congress_id: i64) -> Result<Vec<Player>> {
        Ok(sqlx::query_as(
            "select p.* from players p
                        inner join congress_players cp on p.player_tag = cp.player_tag
                        where cp.congress_id = ?
                        order by cp.rowid",
        )
        .bind(congress_id)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn add_congress(&self, congress: NewCongress) -> Result<i64> {
        let congress = congress.validate()?;
        log::debug!("Creating congress {}", congress.name);

        let mut tx = self.db.begin().await?;
        for tag in &congress.player_tags {
            let known: i64 = sqlx::query_scalar("select count(*) from players where player_tag = ?")
                .bind(tag)
                .fetch_one(&mut *tx)
                .await?;
            if known == 0 {
                return Err(Error::validation(format!("Unknown player {}", tag)));
            }
        }

        let congress_id = sqlx::query(
            "insert into congresses(name, date, location, notes) values(?, ?, ?, ?)",
        )
        .bind(&congress.name)
        .bind(congress.date)
        .bind(&congress.location)
        .bind(&congress.notes)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for tag in &congress.player_tags {
            sqlx::query("insert into congress_players(congress_id, player_tag) values(?, ?)")
                .bind(congress_id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(congress_id)
    }

    /// All rounds of a congress in play order, results ranked best first.
    pub async fn get_rounds(&self, congress_id: i64) -> Result<Vec<Round>> {
        let rounds: Vec<Round> = sqlx::query_as(
            "select round_id, congress_id, difficulty, round_order from rounds
                        where congress_id = ?
                        order by round_order, round_id",
        )
        .bind(congress_id)
        .fetch_all(&self.db)
        .await?;

        let rows: Vec<RoundRow> = self.fetch_round_rows(congress_id).await?;
        let mut results: HashMap<i64, Vec<RoundPlayer>> = HashMap::new();
        for row in rows {
            results.entry(row.round_id).or_default().push(row.player);
        }

        Ok(rounds
            .into_iter()
            .map(|r| {
                let players = results.remove(&r.round_id).unwrap_or_default();
                r.with_players(players)
            })
            .collect())
    }

    async fn fetch_round_rows(&self, congress_id: i64) -> Result<Vec<RoundRow>> {
        Ok(sqlx::query_as(
            "select rp.* from round_players rp
                        inner join rounds r on r.round_id = rp.round_id
                        where r.congress_id = ?
                        order by rp.final_rank is null, rp.final_rank, rp.rowid",
        )
        .bind(congress_id)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn get_round(&self, congress_id: i64, round_id: i64) -> Result<Round> {
        self.get_rounds(congress_id)
            .await?
            .into_iter()
            .find(|r| r.round_id == round_id)
            .ok_or_else(|| Error::not_found("Round not found"))
    }

    /// Stores a new round and its results as one unit.
    ///
    /// The round is numbered after the congress's existing rounds. If nobody
    /// has reached a stage the round is stored live, otherwise ranked.
    pub async fn add_round(&self, congress_id: i64, new_round: NewRound) -> Result<Round> {
        round::validate_results(new_round.difficulty, &new_round.players)?;
        let congress = self.get_congress(congress_id).await?;
        for result in &new_round.players {
            if !congress.has_player(&result.player_tag) {
                return Err(Error::validation(format!(
                    "Player {} is not part of {}",
                    result.player_tag, congress.name
                )));
            }
        }

        let rows = round::prepare_new_round(&new_round.players);

        let mut tx = self.db.begin().await?;
        let round_count: i64 = sqlx::query_scalar("select count(*) from rounds where congress_id = ?")
            .bind(congress_id)
            .fetch_one(&mut *tx)
            .await?;
        let round_order = round_count + 1;

        let round_id = sqlx::query(
            "insert into rounds(congress_id, difficulty, round_order) values(?, ?, ?)",
        )
        .bind(congress_id)
        .bind(new_round.difficulty)
        .bind(round_order)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        log::debug!(
            "Creating round {} of congress {} ({:?})",
            round_order,
            congress_id,
            round::round_state(&rows)
        );

        for row in &rows {
            sqlx::query(
                "insert into round_players(
                            round_id, player_tag, stage_reached, lives_lost,
                            extra_stages, monkey_used, tiebreaker_points, final_rank
                        ) values(?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(round_id)
            .bind(&row.player_tag)
            .bind(row.stage_reached)
            .bind(row.lives_lost)
            .bind(row.extra_stages)
            .bind(row.monkey_used)
            .bind(row.tiebreaker_points)
            .bind(row.final_rank)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.get_round(congress_id, round_id).await
    }

    /// Replaces every result of a round and ranks them again.
    ///
    /// The submitted players must be exactly the round's players.
    pub async fn update_round(
        &self,
        congress_id: i64,
        round_id: i64,
        update: UpdateRound,
    ) -> Result<Round> {
        let current = self.get_round(congress_id, round_id).await?;
        round::validate_results(current.difficulty, &update.players)?;

        let mut stored: Vec<&str> = current.players.iter().map(|p| p.player_tag.as_str()).collect();
        let mut submitted: Vec<&str> = update.players.iter().map(|p| p.player_tag.as_str()).collect();
        stored.sort_unstable();
        submitted.sort_unstable();
        if stored != submitted {
            return Err(Error::validation(format!(
                "Results must cover exactly the players of round {}",
                current.round_order
            )));
        }

        let rows = round::finish_round(&update.players);
        log::debug!("Updating round {} of congress {}", current.round_order, congress_id);

        let mut tx = self.db.begin().await?;
        for row in &rows {
            let updated = sqlx::query(
                "update round_players
                            set stage_reached = ?, lives_lost = ?, extra_stages = ?,
                                monkey_used = ?, tiebreaker_points = ?, final_rank = ?
                            where round_id = ? and player_tag = ?",
            )
            .bind(row.stage_reached)
            .bind(row.lives_lost)
            .bind(row.extra_stages)
            .bind(row.monkey_used)
            .bind(row.tiebreaker_points)
            .bind(row.final_rank)
            .bind(round_id)
            .bind(&row.player_tag)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(Error::not_found(format!(
                    "Player {} is not in this round",
                    row.player_tag
                )));
            }
        }

        tx.commit().await?;
        self.get_round(congress_id, round_id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        core::{
            player::Monkey,
            round::{Difficulty, PlayerResult, RoundState},
        },
        util::parse_date,
    };

    use super::*;

    async fn seeded_db() -> LeagueDb {
        let db = LeagueDb::memory().await.unwrap();
        for (tag, monkey) in [
            ("aiai_fan", Monkey::AiAi),
            ("meemee_fan", Monkey::MeeMee),
            ("baby_fan", Monkey::Baby),
            ("gongon_fan", Monkey::GonGon),
        ] {
            db.add_player(NewPlayer {
                player_tag: tag.to_owned(),
                real_name: tag.to_uppercase(),
                monkey_preference: monkey,
                profile_picture_id: 1,
            })
            .await
            .unwrap();
        }
        db
    }

    async fn add_congress(db: &LeagueDb, tags: &[&str]) -> i64 {
        db.add_congress(NewCongress {
            name: "Congress".to_owned(),
            date: parse_date("2024-06-01").unwrap(),
            location: Some("Lab".to_owned()),
            notes: None,
            player_tags: tags.iter().map(|t| t.to_string()).collect(),
        })
        .await
        .unwrap()
    }

    fn result(tag: &str, stage: u32, lives: u32) -> PlayerResult {
        PlayerResult {
            player_tag: tag.to_owned(),
            stage_reached: stage,
            lives_lost: lives,
            extra_stages: 0,
            monkey_used: Monkey::Baby,
            tiebreaker_points: None,
        }
    }

    #[tokio::test]
    async fn test_players() {
        let db = seeded_db().await;

        let players = db.get_players().await.unwrap();
        assert_eq!(players.len(), 4);
        assert_eq!(players[0].player_tag, "gongon_fan");

        let baby = db.find_player("baby_fan").await.unwrap();
        assert_eq!(baby.monkey_preference, Monkey::Baby);
        assert!(matches!(db.find_player("nobody").await, Err(Error::NotFound(_))));

        let dup = db
            .add_player(NewPlayer {
                player_tag: "baby_fan".to_owned(),
                real_name: "Again".to_owned(),
                monkey_preference: Monkey::AiAi,
                profile_picture_id: 0,
            })
            .await;
        assert!(matches!(dup, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_congresses() {
        let db = seeded_db().await;
        let id = add_congress(&db, &["baby_fan", "aiai_fan"]).await;

        let congress = db.get_congress(id).await.unwrap();
        assert_eq!(congress.players, vec!["baby_fan", "aiai_fan"]);
        assert_eq!(congress.location.as_deref(), Some("Lab"));

        let roster = db.get_congress_players(id).await.unwrap();
        assert_eq!(roster[0].player_tag, "baby_fan");

        assert_eq!(db.get_congresses().await.unwrap().len(), 1);
        assert!(matches!(db.get_congress(id + 1).await, Err(Error::NotFound(_))));

        let unknown = db
            .add_congress(NewCongress {
                name: "Ghosts".to_owned(),
                date: parse_date("2024-06-02").unwrap(),
                location: None,
                notes: None,
                player_tags: vec!["baby_fan".to_owned(), "ghost".to_owned()],
            })
            .await;
        assert!(matches!(unknown, Err(Error::Validation(_))));
        assert_eq!(db.get_congresses().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_round_lifecycle() {
        let db = seeded_db().await;
        let id = add_congress(&db, &["aiai_fan", "meemee_fan", "baby_fan"]).await;

        let live = db
            .add_round(
                id,
                NewRound {
                    difficulty: Difficulty::Beginner,
                    players: vec![result("aiai_fan", 0, 0), result("meemee_fan", 0, 0)],
                },
            )
            .await
            .unwrap();
        assert_eq!(live.round_order, 1);
        assert_eq!(live.state, RoundState::Live);
        assert!(live.players.iter().all(|p| p.final_rank.is_none()));

        let finished = db
            .add_round(
                id,
                NewRound {
                    difficulty: Difficulty::Advanced,
                    players: vec![
                        result("aiai_fan", 20, 2),
                        result("meemee_fan", 20, 0),
                        result("baby_fan", 25, 5),
                    ],
                },
            )
            .await
            .unwrap();
        assert_eq!(finished.round_order, 2);
        assert_eq!(finished.state, RoundState::Finished);
        let order: Vec<_> = finished.players.iter().map(|p| p.player_tag.as_str()).collect();
        assert_eq!(order, vec!["baby_fan", "meemee_fan", "aiai_fan"]);

        let update = UpdateRound {
            players: vec![result("aiai_fan", 3, 1), result("meemee_fan", 7, 4)],
        };
        let updated = db.update_round(id, live.round_id, update.clone()).await.unwrap();
        assert_eq!(updated.state, RoundState::Finished);
        assert_eq!(updated.players[0].player_tag, "meemee_fan");
        assert_eq!(updated.players[0].final_rank, Some(1));
        assert_eq!(updated.players[1].final_rank, Some(2));

        let again = db.update_round(id, live.round_id, update).await.unwrap();
        assert_eq!(again, updated);

        let rounds = db.get_rounds(id).await.unwrap();
        assert_eq!(rounds.len(), 2);
        assert_eq!(rounds[0].round_id, live.round_id);
    }

    #[tokio::test]
    async fn test_round_rejections() {
        let db = seeded_db().await;
        let id = add_congress(&db, &["aiai_fan", "meemee_fan"]).await;

        let outsider = db
            .add_round(
                id,
                NewRound {
                    difficulty: Difficulty::Beginner,
                    players: vec![result("aiai_fan", 1, 0), result("gongon_fan", 2, 0)],
                },
            )
            .await;
        assert!(matches!(outsider, Err(Error::Validation(_))));

        let missing = db
            .add_round(
                id + 10,
                NewRound {
                    difficulty: Difficulty::Beginner,
                    players: vec![result("aiai_fan", 1, 0), result("meemee_fan", 2, 0)],
                },
            )
            .await;
        assert!(matches!(missing, Err(Error::NotFound(_))));

        let round = db
            .add_round(
                id,
                NewRound {
                    difficulty: Difficulty::Beginner,
                    players: vec![result("aiai_fan", 1, 0), result("meemee_fan", 2, 0)],
                },
            )
            .await
            .unwrap();

        let partial = db
            .update_round(
                id,
                round.round_id,
                UpdateRound {
                    players: vec![result("aiai_fan", 5, 0), result("baby_fan", 2, 0)],
                },
            )
            .await;
        assert!(matches!(partial, Err(Error::Validation(_))));

        let too_deep = db
            .update_round(
                id,
                round.round_id,
                UpdateRound {
                    players: vec![result("aiai_fan", 11, 0), result("meemee_fan", 2, 0)],
                },
            )
            .await;
        assert!(matches!(too_deep, Err(Error::Validation(_))));

        assert!(matches!(
            db.update_round(id, round.round_id + 1, UpdateRound { players: vec![] }).await,
            Err(Error::NotFound(_))
        ));

        let stored = db.get_round(id, round.round_id).await.unwrap();
        assert_eq!(stored, round);
    }

    #[tokio::test]
    async fn test_failed_round_rolls_back() {
        let db = seeded_db().await;
        let id = add_congress(&db, &["aiai_fan", "meemee_fan"]).await;

        // A roster entry without a player record makes the second result
        // row fail its foreign key.
        sqlx::query("pragma foreign_keys = off").execute(&db.db).await.unwrap();
        sqlx::query("insert into congress_players(congress_id, player_tag) values(?, 'ghost')")
            .bind(id)
            .execute(&db.db)
            .await
            .unwrap();
        sqlx::query("pragma foreign_keys = on").execute(&db.db).await.unwrap();

        let res = db
            .add_round(
                id,
                NewRound {
                    difficulty: Difficulty::Beginner,
                    players: vec![result("aiai_fan", 2, 0), result("ghost", 1, 0)],
                },
            )
            .await;
        assert!(matches!(res, Err(Error::Database(_))));
        assert!(db.get_rounds(id).await.unwrap().is_empty());

        let orphans: i64 = sqlx::query_scalar("select count(*) from round_players")
            .fetch_one(&db.db)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
