use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;
use crate::models::member::Member;
use crate::models::snapshot::{Group, SnapshotMember};

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: String,
    pub group_id: String,
    pub name: String,
    pub role: String,
    pub position: i64,
}

impl MemberRow {
    pub fn into_member(self) -> Member {
        Member {
            id: self.id,
            name: self.name,
            role: self.role,
        }
    }
}

impl TryFrom<&Row<'_>> for MemberRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            group_id: row.get("group_id")?,
            name: row.get("name")?,
            role: row.get("role")?,
            position: row.get("position")?,
        })
    }
}

pub struct MemberRepository;

impl MemberRepository {
    pub fn upsert_group(conn: &Connection, group: &Group) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO groups (id, name)
                VALUES (:id, :name)
                ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
            named_params! {":id": &group.id, ":name": &group.name},
        )?;
        Ok(())
    }

    pub fn group_exists(conn: &Connection, group_id: &str) -> AppResult<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM groups WHERE id = :id",
                named_params! {":id": group_id},
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// `position` fixes roster order, which is the last tie-breaker.
    pub fn upsert_member(conn: &Connection, member: &SnapshotMember, position: i64) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO group_members (id, group_id, name, role, position)
                VALUES (:id, :group_id, :name, :role, :position)
                ON CONFLICT(id) DO UPDATE SET
                    group_id = excluded.group_id,
                    name = excluded.name,
                    role = excluded.role,
                    position = excluded.position
            "#,
            named_params! {
                ":id": &member.member.id,
                ":group_id": &member.group_id,
                ":name": &member.member.name,
                ":role": &member.member.role,
                ":position": position,
            },
        )?;
        Ok(())
    }

    pub fn list_for_group(conn: &Connection, group_id: &str) -> AppResult<Vec<Member>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, group_id, name, role, position
                FROM group_members
                WHERE group_id = :group_id
                ORDER BY position ASC, id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(named_params! {":group_id": group_id}, |row| {
                MemberRow::try_from(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().map(MemberRow::into_member).collect())
    }
}
