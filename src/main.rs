#[actix_web::main]
async fn main() -> std::io::Result<()> {
    road_report_server::run().await
}
