use super::*;

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiResponse<T: Serialize> {
  pub code: i32,
  /// ok
  pub msg: String,
  pub data: T,
}

impl<T> ApiResponse<T>
where
  T: Serialize,
{
  fn new(code: i32, msg: String, data: T) -> Self {
    Self { code, msg, data }
  }

  pub fn ok(data: T) -> Self {
    Self::new(0, "ok".to_string(), data)
  }
}
