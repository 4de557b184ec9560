use tesla_api::{Client, Request, TeslaApiError};

#[tokio::main]
pub async fn main() -> Result<(), TeslaApiError> {
    let client = Client::new("api_token");

    let req = Request::vehicles().list();

    let res = client.send(req).await?;
    for vehicle in res.response {
        println!("{} {} {:?}", vehicle.id, vehicle.vin, vehicle.state);
    }
    Ok(())
}
