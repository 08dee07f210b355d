use serde::{ser::Error as _, Serialize, Serializer};

use crate::reactive::{Memo, Projection, ReadSignal, Signal};

impl<T: Serialize + 'static> Serialize for Signal<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.with(|value| value.serialize(serializer))
    }
}

impl<T: Serialize + 'static> Serialize for ReadSignal<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.with(|value| value.serialize(serializer))
    }
}

impl<T: Serialize + 'static> Serialize for Memo<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.try_with(|value| value.serialize(serializer))
            .map_err(S::Error::custom)?
    }
}

impl<T: Serialize + 'static> Serialize for Projection<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.try_with(|value| value.serialize(serializer))
            .map_err(S::Error::custom)?
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
