//! Implementación PostgreSQL del repositorio de despacho
//!
//! Las operaciones de varias sentencias abren una transacción con
//! `pool.begin()`; las transiciones de estado son UPDATE condicionados al
//! estado esperado y un UPDATE sin filas se reporta como `Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::dispatch_repository::{
    CompletedWaypoint, DispatchRepository, EndShiftUpdate, MoveFinalization, NewShiftPlan,
    StartShiftUpdate, TerminationOutcome, WaypointCompletion,
};
use crate::models::{
    Bin, Check, DriverLocation, IncidentStats, MoveHistory, MoveRequest, MoveRequestStatus, Shift,
    ShiftHistory, ShiftStatus, Waypoint,
};
use crate::utils::errors::{AppError, AppResult};

pub struct PgDispatchRepository {
    pool: PgPool,
}

impl PgDispatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Convierte violaciones de índices únicos en `Conflict`
fn conflict_on_unique(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(e),
    }
}

fn status_names(statuses: &[ShiftStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Devuelve las move requests abiertas del turno a `pending`
async fn revert_move_requests(
    tx: &mut Transaction<'_, Postgres>,
    shift_id: Uuid,
    at: DateTime<Utc>,
) -> AppResult<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        UPDATE move_requests
        SET status = 'pending', assigned_shift_id = NULL, updated_at = $2
        WHERE assigned_shift_id = $1 AND status IN ('assigned', 'in_progress')
        RETURNING id
        "#,
    )
    .bind(shift_id)
    .bind(at)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[async_trait]
impl DispatchRepository for PgDispatchRepository {
    async fn find_bins(&self, ids: &[Uuid]) -> AppResult<Vec<Bin>> {
        let bins = sqlx::query_as::<_, Bin>("SELECT * FROM bins WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(bins)
    }

    async fn find_bin(&self, id: Uuid) -> AppResult<Option<Bin>> {
        let bin = sqlx::query_as::<_, Bin>("SELECT * FROM bins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(bin)
    }

    async fn route_bin_order(&self, route_id: Uuid) -> AppResult<Option<Vec<Uuid>>> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM routes WHERE id = $1)")
            .bind(route_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Ok(None);
        }

        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT bin_id FROM route_bins WHERE route_id = $1 ORDER BY sequence_order",
        )
        .bind(route_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(rows.into_iter().map(|(id,)| id).collect()))
    }

    async fn find_move_requests(&self, ids: &[Uuid]) -> AppResult<Vec<MoveRequest>> {
        let requests =
            sqlx::query_as::<_, MoveRequest>("SELECT * FROM move_requests WHERE id = ANY($1)")
                .bind(ids.to_vec())
                .fetch_all(&self.pool)
                .await?;
        Ok(requests)
    }

    async fn find_move_request(&self, id: Uuid) -> AppResult<Option<MoveRequest>> {
        let request = sqlx::query_as::<_, MoveRequest>("SELECT * FROM move_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    async fn find_shift(&self, id: Uuid) -> AppResult<Option<Shift>> {
        let shift = sqlx::query_as::<_, Shift>("SELECT * FROM shifts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(shift)
    }

    async fn find_driver_shift(
        &self,
        driver_id: Uuid,
        statuses: &[ShiftStatus],
    ) -> AppResult<Option<Shift>> {
        // Un turno en curso tiene prioridad sobre uno listo en cola
        let shift = sqlx::query_as::<_, Shift>(
            r#"
            SELECT * FROM shifts
            WHERE driver_id = $1 AND status::text = ANY($2)
            ORDER BY (status = 'ready') ASC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(driver_id)
        .bind(status_names(statuses))
        .fetch_optional(&self.pool)
        .await?;
        Ok(shift)
    }

    async fn shift_waypoints(&self, shift_id: Uuid) -> AppResult<Vec<Waypoint>> {
        let waypoints = sqlx::query_as::<_, Waypoint>(
            "SELECT * FROM shift_waypoints WHERE shift_id = $1 ORDER BY sequence_order, id",
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(waypoints)
    }

    async fn create_shift(&self, plan: NewShiftPlan) -> AppResult<Shift> {
        let mut tx = self.pool.begin().await?;
        let shift = &plan.shift;

        let created = sqlx::query_as::<_, Shift>(
            r#"
            INSERT INTO shifts (
                id, driver_id, route_id, status, start_time, end_time, total_pause_seconds,
                pause_started_at, total_bins, completed_bins, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(shift.id)
        .bind(shift.driver_id)
        .bind(shift.route_id)
        .bind(shift.status)
        .bind(shift.start_time)
        .bind(shift.end_time)
        .bind(shift.total_pause_seconds)
        .bind(shift.pause_started_at)
        .bind(shift.total_bins)
        .bind(shift.completed_bins)
        .bind(shift.created_at)
        .bind(shift.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "Driver already has a ready shift"))?;

        for waypoint in &plan.waypoints {
            sqlx::query(
                r#"
                INSERT INTO shift_waypoints (
                    id, shift_id, bin_id, sequence_order, is_completed, completed_at,
                    updated_fill_percentage, stop_type, move_request_id, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(waypoint.id)
            .bind(created.id)
            .bind(waypoint.bin_id)
            .bind(waypoint.sequence_order)
            .bind(waypoint.is_completed)
            .bind(waypoint.completed_at)
            .bind(waypoint.updated_fill_percentage)
            .bind(waypoint.stop_type)
            .bind(waypoint.move_request_id)
            .bind(waypoint.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "Duplicate waypoint sequence in shift"))?;
        }

        if !plan.move_request_ids.is_empty() {
            let assigned = sqlx::query(
                r#"
                UPDATE move_requests
                SET status = 'assigned', assigned_shift_id = $2, updated_at = $3
                WHERE id = ANY($1) AND status = 'pending'
                "#,
            )
            .bind(plan.move_request_ids.clone())
            .bind(created.id)
            .bind(created.created_at)
            .execute(&mut *tx)
            .await?;

            if assigned.rows_affected() as usize != plan.move_request_ids.len() {
                return Err(AppError::Conflict(
                    "Move request is no longer pending".to_string(),
                ));
            }
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn start_shift(&self, update: StartShiftUpdate) -> AppResult<Shift> {
        let mut tx = self.pool.begin().await?;

        let started = sqlx::query_as::<_, Shift>(
            r#"
            UPDATE shifts
            SET status = 'active', start_time = $2, updated_at = $2
            WHERE id = $1 AND status = 'ready'
            RETURNING *
            "#,
        )
        .bind(update.shift_id)
        .bind(update.started_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "Driver already has a running shift"))?
        .ok_or_else(|| AppError::Conflict("Shift is no longer ready".to_string()))?;

        // Vaciar antes de reescribir para no chocar con el índice único de secuencia
        sqlx::query("UPDATE shift_waypoints SET sequence_order = 0 WHERE shift_id = $1")
            .bind(update.shift_id)
            .execute(&mut *tx)
            .await?;

        let (ids, positions): (Vec<Uuid>, Vec<i32>) = update.positions.iter().copied().unzip();
        sqlx::query(
            r#"
            UPDATE shift_waypoints AS w
            SET sequence_order = p.position
            FROM UNNEST($2::uuid[], $3::int4[]) AS p(id, position)
            WHERE w.id = p.id AND w.shift_id = $1
            "#,
        )
        .bind(update.shift_id)
        .bind(ids)
        .bind(positions)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE move_requests
            SET status = 'in_progress', updated_at = $2
            WHERE assigned_shift_id = $1 AND status = 'assigned'
            "#,
        )
        .bind(update.shift_id)
        .bind(update.started_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(started)
    }

    async fn pause_shift(&self, shift_id: Uuid, at: DateTime<Utc>) -> AppResult<Shift> {
        sqlx::query_as::<_, Shift>(
            r#"
            UPDATE shifts
            SET status = 'paused', pause_started_at = $2, updated_at = $2
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(shift_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Conflict("Shift is not active".to_string()))
    }

    async fn resume_shift(
        &self,
        shift_id: Uuid,
        added_pause_seconds: i64,
        at: DateTime<Utc>,
    ) -> AppResult<Shift> {
        sqlx::query_as::<_, Shift>(
            r#"
            UPDATE shifts
            SET status = 'active',
                total_pause_seconds = total_pause_seconds + $2,
                pause_started_at = NULL,
                updated_at = $3
            WHERE id = $1 AND status = 'paused'
            RETURNING *
            "#,
        )
        .bind(shift_id)
        .bind(added_pause_seconds)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Conflict("Shift is not paused".to_string()))
    }

    async fn end_shift(&self, update: EndShiftUpdate) -> AppResult<TerminationOutcome> {
        let mut tx = self.pool.begin().await?;
        let history = &update.history;

        // El historial va primero: si falla, el turno sigue en curso
        sqlx::query(
            r#"
            INSERT INTO shift_history (
                id, shift_id, driver_id, route_id, started_at, ended_at, shift_created_at,
                created_at, total_pause_seconds, total_bins, completed_bins, completion_rate,
                total_incidents, field_observations, end_reason, ended_by, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(history.id)
        .bind(history.shift_id)
        .bind(history.driver_id)
        .bind(history.route_id)
        .bind(history.started_at)
        .bind(history.ended_at)
        .bind(history.shift_created_at)
        .bind(history.created_at)
        .bind(history.total_pause_seconds)
        .bind(history.total_bins)
        .bind(history.completed_bins)
        .bind(history.completion_rate)
        .bind(history.total_incidents)
        .bind(history.field_observations)
        .bind(history.end_reason)
        .bind(history.ended_by)
        .bind(&history.metadata)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "Shift history already recorded"))?;

        let shift = sqlx::query_as::<_, Shift>(
            r#"
            UPDATE shifts
            SET status = 'ended', end_time = $2, total_pause_seconds = $3,
                pause_started_at = NULL, updated_at = $2
            WHERE id = $1 AND status IN ('active', 'paused')
            RETURNING *
            "#,
        )
        .bind(update.shift_id)
        .bind(update.ended_at)
        .bind(update.total_pause_seconds)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Conflict("Shift is not running".to_string()))?;

        let reverted = revert_move_requests(&mut tx, update.shift_id, update.ended_at).await?;

        let removed = if reverted.is_empty() {
            0
        } else {
            sqlx::query(
                r#"
                DELETE FROM shift_waypoints
                WHERE shift_id = $1 AND is_completed = FALSE AND move_request_id = ANY($2)
                "#,
            )
            .bind(update.shift_id)
            .bind(reverted.clone())
            .execute(&mut *tx)
            .await?
            .rows_affected() as usize
        };

        tx.commit().await?;

        Ok(TerminationOutcome {
            shift,
            reverted_move_requests: reverted,
            removed_waypoints: removed,
        })
    }

    async fn cancel_shift(&self, shift_id: Uuid, at: DateTime<Utc>) -> AppResult<TerminationOutcome> {
        let mut tx = self.pool.begin().await?;

        let shift = sqlx::query_as::<_, Shift>(
            r#"
            UPDATE shifts
            SET status = 'cancelled', end_time = $2, pause_started_at = NULL, updated_at = $2
            WHERE id = $1 AND status IN ('ready', 'active', 'paused')
            RETURNING *
            "#,
        )
        .bind(shift_id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Conflict("Shift is already ended or cancelled".to_string()))?;

        let reverted = revert_move_requests(&mut tx, shift_id, at).await?;

        let removed = sqlx::query("DELETE FROM shift_waypoints WHERE shift_id = $1")
            .bind(shift_id)
            .execute(&mut *tx)
            .await?
            .rows_affected() as usize;

        tx.commit().await?;

        Ok(TerminationOutcome {
            shift,
            reverted_move_requests: reverted,
            removed_waypoints: removed,
        })
    }

    async fn shift_history(&self, shift_id: Uuid) -> AppResult<Vec<ShiftHistory>> {
        let rows = sqlx::query_as::<_, ShiftHistory>(
            "SELECT * FROM shift_history WHERE shift_id = $1 ORDER BY created_at",
        )
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn incident_stats(&self, shift_id: Uuid) -> AppResult<IncidentStats> {
        let (total, observations): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE incident_type IS NOT NULL),
                COUNT(*) FILTER (WHERE field_observation)
            FROM checks
            WHERE shift_id = $1
            "#,
        )
        .bind(shift_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(IncidentStats {
            total_incidents: total as i32,
            field_observations: observations as i32,
        })
    }

    async fn complete_waypoint(
        &self,
        completion: WaypointCompletion,
    ) -> AppResult<Option<CompletedWaypoint>> {
        let WaypointCompletion {
            waypoint_id,
            fill_percentage,
            record_bin_check,
            check,
            at,
        } = completion;
        let mut tx = self.pool.begin().await?;

        let waypoint = sqlx::query_as::<_, Waypoint>(
            r#"
            UPDATE shift_waypoints
            SET is_completed = TRUE, completed_at = $2, updated_fill_percentage = $3
            WHERE id = $1 AND is_completed = FALSE
            RETURNING *
            "#,
        )
        .bind(waypoint_id)
        .bind(at)
        .bind(fill_percentage)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(waypoint) = waypoint else {
            tx.rollback().await?;
            return Ok(None);
        };

        let shift = sqlx::query_as::<_, Shift>(
            r#"
            UPDATE shifts
            SET completed_bins = completed_bins + 1, updated_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(waypoint.shift_id)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        if record_bin_check {
            sqlx::query(
                r#"
                UPDATE bins
                SET fill_percentage = COALESCE($2, fill_percentage), last_checked = $3, updated_at = $3
                WHERE id = $1
                "#,
            )
            .bind(waypoint.bin_id)
            .bind(fill_percentage)
            .bind(at)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                UPDATE check_recommendations
                SET status = 'resolved', resolved_at = $2
                WHERE bin_id = $1 AND status = 'pending'
                "#,
            )
            .bind(waypoint.bin_id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        }

        let check = sqlx::query_as::<_, Check>(
            r#"
            INSERT INTO checks (
                id, bin_id, shift_id, shift_bin_id, source, fill_percentage, photo_url,
                checked_by, checked_at, incident_type, field_observation
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(check.id)
        .bind(check.bin_id)
        .bind(check.shift_id)
        .bind(check.shift_bin_id)
        .bind(check.source)
        .bind(check.fill_percentage)
        .bind(&check.photo_url)
        .bind(check.checked_by)
        .bind(check.checked_at)
        .bind(&check.incident_type)
        .bind(check.field_observation)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(CompletedWaypoint {
            waypoint,
            shift,
            check,
        }))
    }

    async fn finalize_move_request(
        &self,
        move_request_id: Uuid,
        finalization: MoveFinalization,
        at: DateTime<Utc>,
    ) -> AppResult<MoveRequest> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, MoveRequest>(
            r#"
            UPDATE move_requests
            SET status = $2, completed_at = $3, updated_at = $3
            WHERE id = $1 AND status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(move_request_id)
        .bind(MoveRequestStatus::Completed)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Conflict("Move request is not in progress".to_string()))?;

        match finalization {
            MoveFinalization::SetStatus(status) => {
                sqlx::query("UPDATE bins SET status = $2, updated_at = $3 WHERE id = $1")
                    .bind(request.bin_id)
                    .bind(status)
                    .bind(at)
                    .execute(&mut *tx)
                    .await?;
            }
            MoveFinalization::Relocate { relocation, history } => {
                sqlx::query(
                    r#"
                    UPDATE bins
                    SET latitude = $2, longitude = $3, current_street = $4, city = $5, zip = $6,
                        status = 'active', updated_at = $7
                    WHERE id = $1
                    "#,
                )
                .bind(request.bin_id)
                .bind(relocation.location.latitude)
                .bind(relocation.location.longitude)
                .bind(&relocation.street)
                .bind(&relocation.city)
                .bind(&relocation.zip)
                .bind(at)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO move_history (
                        id, bin_id, move_request_id, shift_id, moved_by, moved_at,
                        from_street, from_city, from_zip, from_latitude, from_longitude,
                        to_street, to_city, to_zip, to_latitude, to_longitude
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                    "#,
                )
                .bind(history.id)
                .bind(history.bin_id)
                .bind(history.move_request_id)
                .bind(history.shift_id)
                .bind(history.moved_by)
                .bind(history.moved_at)
                .bind(&history.from_street)
                .bind(&history.from_city)
                .bind(&history.from_zip)
                .bind(history.from_latitude)
                .bind(history.from_longitude)
                .bind(&history.to_street)
                .bind(&history.to_city)
                .bind(&history.to_zip)
                .bind(history.to_latitude)
                .bind(history.to_longitude)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(request)
    }

    async fn move_history_for_bin(&self, bin_id: Uuid) -> AppResult<Vec<MoveHistory>> {
        let rows = sqlx::query_as::<_, MoveHistory>(
            "SELECT * FROM move_history WHERE bin_id = $1 ORDER BY moved_at",
        )
        .bind(bin_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn upsert_driver_location(&self, location: DriverLocation) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO driver_locations (driver_id, latitude, longitude, accuracy, heading, speed, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (driver_id) DO UPDATE SET
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                accuracy = EXCLUDED.accuracy,
                heading = EXCLUDED.heading,
                speed = EXCLUDED.speed,
                recorded_at = EXCLUDED.recorded_at
            "#,
        )
        .bind(location.driver_id)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(location.accuracy)
        .bind(location.heading)
        .bind(location.speed)
        .bind(location.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn driver_location(&self, driver_id: Uuid) -> AppResult<Option<DriverLocation>> {
        let location = sqlx::query_as::<_, DriverLocation>(
            "SELECT * FROM driver_locations WHERE driver_id = $1",
        )
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(location)
    }

    async fn device_token(&self, user_id: Uuid) -> AppResult<Option<String>> {
        let token: Option<(String,)> =
            sqlx::query_as("SELECT token FROM device_tokens WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(token.map(|(token,)| token))
    }
}
