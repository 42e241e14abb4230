macro_rules! id_newtype {
  ($name:ident, $inner:ty) => {
    #[derive(
      Clone,
      Copy,
      PartialEq,
      Eq,
      Hash,
      PartialOrd,
      Ord,
      Debug,
      serde::Serialize,
      serde::Deserialize,
    )]
    pub struct $name(pub $inner);

    impl $name {
      pub fn index(self) -> usize {
        self.0 as usize
      }
    }

    impl From<$inner> for $name {
      fn from(value: $inner) -> Self {
        Self(value)
      }
    }
  };
}

id_newtype!(TypeId, u32);
id_newtype!(NameId, u32);
id_newtype!(DeclId, u32);
