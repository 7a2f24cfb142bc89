/// A delivery adapter that turns one request into one response.
pub trait Handler {
    type Request;
    type Response;

    fn handle(&mut self, request: Self::Request) -> Self::Response;
}
