use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bin_dispatch::config::database::DatabaseConfig;
use bin_dispatch::config::environment::EnvironmentConfig;
use bin_dispatch::database;
use bin_dispatch::repositories::{
    DispatchRepository, MemoryDispatchRepository, PgDispatchRepository,
};
use bin_dispatch::routes::create_router;
use bin_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🗑️ Bin Dispatch - Motor de despacho de turnos");
    info!("================================================");

    let config = EnvironmentConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Configuración inválida: {}", e))?;

    if config.is_production() && config.cors_origins.is_empty() {
        warn!("⚠️ CORS_ORIGINS vacío en producción: se aceptan todos los orígenes");
    }
    if config.is_development() {
        info!("🛠️ Modo desarrollo ({})", config.server_url());
    }

    // Inicializar almacenamiento
    let repository: Arc<dyn DispatchRepository> =
        match std::env::var("STORAGE").ok().as_deref() {
            Some("memory") => {
                warn!("⚠️ STORAGE=memory: los datos no se persisten");
                Arc::new(MemoryDispatchRepository::new())
            }
            _ => {
                let db_config = DatabaseConfig::from_env()
                    .map_err(|e| anyhow::anyhow!("Error de configuración: {}", e))?;
                let pool = match database::connect(&db_config).await {
                    Ok(pool) => pool,
                    Err(e) => {
                        error!("❌ Error conectando a la base de datos: {}", e);
                        return Err(anyhow::anyhow!("Error de base de datos: {}", e));
                    }
                };
                Arc::new(PgDispatchRepository::new(pool))
            }
        };

    let app_state = AppState::new(config.clone(), repository)
        .map_err(|e| anyhow::anyhow!("Error inicializando servicios: {}", e))?;
    let side_effects = app_state.side_effects.clone();
    let app = create_router(app_state);

    let addr: SocketAddr = config.server_url().parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Health check");
    info!("🚛 Endpoints - Driver:");
    info!("   GET  /api/driver/shift - Turno actual");
    info!("   POST /api/driver/shift/start - Iniciar turno");
    info!("   POST /api/driver/shift/pause - Pausar turno");
    info!("   POST /api/driver/shift/resume - Reanudar turno");
    info!("   POST /api/driver/shift/end - Finalizar turno");
    info!("   POST /api/driver/shift/complete - Completar parada");
    info!("   GET  /api/driver/shift/:id - Detalle de turno");
    info!("   POST /api/driver/location - Actualizar ubicación");
    info!("🧭 Endpoints - Manager:");
    info!("   POST /api/manager/shifts - Asignar turno");
    info!("   GET  /api/manager/shifts/:id - Detalle de turno");
    info!("   POST /api/manager/shifts/:id/cancel - Cancelar turno");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
    }

    // Esperar los efectos secundarios pendientes (incidentes, push)
    side_effects.drain().await;
    info!(
        "📊 Efectos secundarios: {} exitosos, {} fallidos",
        side_effects.succeeded(),
        side_effects.failed()
    );

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
